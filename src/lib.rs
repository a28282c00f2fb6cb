//! Sightkeys is a sight-reading trainer for keyboard players. It shows a prompt written on the
//! grand staff, waits until the student holds exactly the notes of the prompt on a MIDI keyboard,
//! reveals the answer, and moves on to the next prompt.
//!
//! A practice library is a directory containing a `properties.json` file with the configuration
//! (note positions, image assets, geometry and timing), a directory of prompt definitions, and a
//! directory of pool definitions. Prompts are drawn from the active pool either at random, in
//! proportion to their weights, or in their declared order.
//!
//! The practice loop itself is split in three pure parts which can be tested in isolation:
//! - The [SuiteScheduler](scheduler::SuiteScheduler) chooses the next prompt.
//! - The [NotationLayoutEngine](layout::NotationLayoutEngine) computes the canvas height, the note
//!   offsets and the ledger lines needed to draw it.
//! - The [AnswerMatcher](matcher::AnswerMatcher) decides when the student is holding all of its
//!   keys at the same time.
//!
//! The [SessionController](session::SessionController) composes them with a renderer, an input
//! device, and a source of window events.

pub mod catalog;
pub mod data;
pub mod device;
pub mod error;
pub mod layout;
pub mod logging;
pub mod matcher;
pub mod properties;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod testutil;
pub mod window;

use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use parking_lot::RwLock;
use rand::{Rng, rngs::ThreadRng};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use ustr::Ustr;

use catalog::{LocalPromptCatalog, PromptCatalog};
use device::MidiKeyLookup;
use error::{ConfigurationError, SessionError};
use layout::{NotationLayoutEngine, PositionTable};
use logging::LoggerGuard;
use properties::{LocalProperties, Properties};
use render::{CanvasGeometry, NotationPainter, Renderer};
use scheduler::SuiteScheduler;
use session::{SessionController, SessionOptions};

/// The path to the configuration file inside the library root.
pub const PROPERTIES_PATH: &str = "properties.json";

/// The directory containing the prompt definitions, unless set by `PromptDirectory`.
pub const DEFAULT_PROMPT_DIRECTORY: &str = "cases";

/// The directory containing the pool definitions, unless set by `SuiteDirectory`.
pub const DEFAULT_POOL_DIRECTORY: &str = "suites";

/// The log file, unless set by `LogFile`.
pub const DEFAULT_LOG_FILE: &str = "sightkeys.log";

/// The directory scanned for raw MIDI devices, unless set by `DeviceDirectory`.
pub const DEFAULT_DEVICE_DIRECTORY: &str = "/dev/snd";

/// A practice library opened from disk, from which sessions are started.
pub struct PracticeLibrary {
    /// The path to the root of the library.
    library_root: PathBuf,

    /// The configuration read from the properties file.
    properties: LocalProperties,

    /// The prompts and pools of the library.
    catalog: Arc<RwLock<dyn PromptCatalog + Send + Sync>>,

    /// Builds the canvases of the prompts.
    painter: NotationPainter,

    /// The timing and length of the sessions.
    options: SessionOptions,
}

impl PracticeLibrary {
    /// Opens the library rooted at the given directory.
    pub fn new(library_root: &Path) -> Result<PracticeLibrary> {
        let properties = Self::open_properties(library_root)?;
        Self::with_properties(library_root, properties)
    }

    /// Opens the library rooted at the given directory after installing the logger configured by
    /// its `LogFile` property, so that the notices of the catalog loader end up in the log.
    pub fn open_with_logging(
        library_root: &Path,
        level: LevelFilter,
    ) -> Result<(PracticeLibrary, LoggerGuard)> {
        let properties = Self::open_properties(library_root)?;
        let guard = logging::init(&Self::log_file_of(library_root, &properties), level)?;
        let library = Self::with_properties(library_root, properties)?;
        Ok((library, guard))
    }

    /// Reads the configuration of the library rooted at the given directory.
    pub fn open_properties(library_root: &Path) -> Result<LocalProperties> {
        if !library_root.is_dir() {
            return Err(anyhow!(
                "library root {} must be a directory",
                library_root.display()
            ));
        }
        LocalProperties::open(&library_root.join(PROPERTIES_PATH))
    }

    /// Opens the library rooted at the given directory with an already loaded configuration.
    pub fn with_properties(
        library_root: &Path,
        properties: LocalProperties,
    ) -> Result<PracticeLibrary> {
        let prompt_directory =
            Self::resolve_path(library_root, &properties, "PromptDirectory", DEFAULT_PROMPT_DIRECTORY);
        let pool_directory =
            Self::resolve_path(library_root, &properties, "SuiteDirectory", DEFAULT_POOL_DIRECTORY);
        let catalog = LocalPromptCatalog::open(&prompt_directory, &pool_directory)
            .context("cannot open the prompt catalog")?;

        let painter = NotationPainter::new(
            NotationLayoutEngine::default(),
            PositionTable::from_properties(&properties)?,
            CanvasGeometry::from_properties(&properties)?,
        );
        let options = SessionOptions::from_properties(&properties)?;

        Ok(PracticeLibrary {
            library_root: library_root.to_path_buf(),
            properties,
            catalog: Arc::new(RwLock::new(catalog)),
            painter,
            options,
        })
    }

    /// Returns the path set by the given property, relative to the library root, or the default.
    fn resolve_path(
        library_root: &Path,
        properties: &dyn Properties,
        key: &str,
        default: &str,
    ) -> PathBuf {
        library_root.join(properties.get(key).unwrap_or_else(|| default.to_string()))
    }

    /// Returns the path to the root of the library.
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Returns the configuration of the library.
    pub fn properties(&self) -> &LocalProperties {
        &self.properties
    }

    /// Returns the prompts and pools of the library.
    pub fn catalog(&self) -> Arc<RwLock<dyn PromptCatalog + Send + Sync>> {
        self.catalog.clone()
    }

    /// Returns the path of the log file.
    pub fn log_file(&self) -> PathBuf {
        Self::log_file_of(&self.library_root, &self.properties)
    }

    /// Returns the path of the log file of the library with the given root and configuration.
    pub fn log_file_of(library_root: &Path, properties: &dyn Properties) -> PathBuf {
        Self::resolve_path(library_root, properties, "LogFile", DEFAULT_LOG_FILE)
    }

    /// Returns the directory scanned for MIDI devices. Absolute paths are used as they are.
    pub fn device_directory(&self) -> PathBuf {
        Self::resolve_path(
            &self.library_root,
            &self.properties,
            "DeviceDirectory",
            DEFAULT_DEVICE_DIRECTORY,
        )
    }

    /// Returns the MIDI device chosen by `DeviceId`, if any.
    pub fn device_id(&self) -> Result<Option<usize>, ConfigurationError> {
        self.properties.optional_usize("DeviceId")
    }

    /// Returns the pool a session starts with: the one set by `Suite`, or else the first pool in
    /// ID order.
    pub fn default_pool(&self) -> Result<Ustr, ConfigurationError> {
        if let Some(suite) = self.properties.get("Suite") {
            return Ok(Ustr::from(suite.as_str()));
        }
        self.catalog
            .read()
            .get_pool_ids()
            .first()
            .copied()
            .ok_or_else(|| ConfigurationError::MissingProperty("Suite".to_string()))
    }

    /// Loads all the image assets of the library into the renderer and returns how many there are.
    pub fn load_assets(&self, renderer: &mut dyn Renderer) -> Result<usize, SessionError> {
        render::load_assets(renderer, &self.properties, &self.library_root)
    }

    /// Creates a session drawing prompts from the default pool.
    pub fn new_session(&self) -> Result<SessionController<ThreadRng>, ConfigurationError> {
        self.new_session_with_rng(rand::rng())
    }

    /// Creates a session drawing prompts from the default pool with the given source of
    /// randomness.
    pub fn new_session_with_rng<R: Rng>(
        &self,
        rng: R,
    ) -> Result<SessionController<R>, ConfigurationError> {
        SessionController::new(
            self.catalog.clone(),
            SuiteScheduler::with_rng(rng),
            self.painter.clone(),
            Box::new(MidiKeyLookup),
            self.options.clone(),
            self.default_pool()?,
        )
    }
}
