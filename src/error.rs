//! Contains the errors returned by sightkeys.

use std::{io, path::PathBuf};

use thiserror::Error;
use ustr::Ustr;

/// An error caused by invalid prompt or pool definitions, or by missing or malformed properties.
/// These errors are fatal when loading the library or starting a session.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigurationError {
    #[error("pool {0} has no entries")]
    EmptyPool(Ustr),

    #[error("pool {0} has a non-positive total weight of {1}")]
    NonPositiveTotalWeight(Ustr, i64),

    #[error("the total weight of pool {0} overflows")]
    WeightOverflow(Ustr),

    #[error("entry {1} in pool {0} has a non-positive weight of {2}")]
    NonPositiveWeight(Ustr, Ustr, i64),

    #[error("pool {0} references unknown prompt {1}")]
    UnknownPrompt(Ustr, Ustr),

    #[error("cannot find pool with ID {0}")]
    UnknownPool(Ustr),

    #[error("cannot remove prompt {0} because it is referenced by pool {1}")]
    PromptInUse(Ustr, Ustr),

    #[error("found multiple definitions with ID {0}")]
    DuplicateId(Ustr),

    #[error("missing property {0}")]
    MissingProperty(String),

    #[error("property {0} has invalid value {1:?}")]
    InvalidProperty(String, String),

    #[error("cannot resolve note name {0} to a key")]
    UnknownNote(String),

    #[error("no position is configured for note {0}")]
    MissingPosition(String),

    #[error("note {0} at offset {1} does not fit on a canvas")]
    PositionOverflow(String, u32),

    #[error("prompt {0} has no {1}")]
    MissingField(Ustr, String),

    #[error("cannot read definitions from {0}: {1}")]
    InvalidDefinition(PathBuf, #[source] anyhow::Error),
}

/// An error returned when selecting or reading from an input device.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DeviceError {
    #[error("cannot find MIDI device with ID {0}")]
    NotFound(usize),

    #[error("no input-capable MIDI device was found")]
    NoInputCapableDevice,

    #[error("cannot open MIDI device at {0}: {1}")]
    Open(PathBuf, #[source] io::Error),

    #[error("cannot read from MIDI device: {0}")]
    Read(#[source] io::Error),
}

/// An error returned by a renderer.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum RenderError {
    #[error("asset {0} has not been loaded")]
    MissingAsset(Ustr),

    #[error("cannot load asset {0} from {1}: {2}")]
    LoadAsset(Ustr, PathBuf, #[source] io::Error),

    #[error("cannot present canvas: {0}")]
    Present(#[source] anyhow::Error),
}

/// An error that stops a practice session.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SessionError {
    /// The student asked to quit. This is the normal way a session ends and is converted into a
    /// clean shutdown by [`crate::session::SessionController::run`].
    #[error("the session was cancelled")]
    Cancelled,

    #[error("prompt {0} of type {1} is not supported yet")]
    UnsupportedPrompt(Ustr, String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
