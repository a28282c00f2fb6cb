//! Decides whether the student is holding exactly the notes of the current prompt.
//!
//! The matcher keeps one flag per required key. Pressing a required key sets its flag and
//! releasing it clears it again, so the prompt is only answered at an instant in which every
//! required key is held down at the same time. Playing the notes one after another, releasing each
//! before pressing the next, never answers a prompt with more than one note.

use std::collections::BTreeMap;

use crate::{
    data::Note,
    device::{DeviceEvent, KeyAction, KeyLookup},
    error::ConfigurationError,
};

/// The state of an [AnswerMatcher].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchState {
    /// At least one required key is not held.
    Awaiting,

    /// Every required key was held at the same time. Terminal for the prompt.
    Satisfied,
}

/// Tracks the required keys of a single prompt presentation.
#[derive(Clone, Debug)]
pub struct AnswerMatcher {
    /// Whether each required key is currently held.
    required: BTreeMap<u8, bool>,

    /// The current state.
    state: MatchState,
}

impl AnswerMatcher {
    /// Creates a matcher for the given notes. Fails if a note name cannot be resolved to a key.
    pub fn new(notes: &[Note], lookup: &dyn KeyLookup) -> Result<Self, ConfigurationError> {
        let keys = notes
            .iter()
            .map(|note| {
                lookup
                    .key_code(&note.name)
                    .ok_or_else(|| ConfigurationError::UnknownNote(note.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_keys(keys))
    }

    /// Creates a matcher requiring the given key codes.
    pub fn from_keys(keys: impl IntoIterator<Item = u8>) -> Self {
        let required: BTreeMap<u8, bool> = keys.into_iter().map(|k| (k, false)).collect();

        // A prompt without notes is answered without playing anything.
        let state = if required.is_empty() {
            MatchState::Satisfied
        } else {
            MatchState::Awaiting
        };
        Self { required, state }
    }

    /// Updates the matcher with a device event and returns the resulting state. Events are ignored
    /// once the matcher is satisfied, as are events for keys that are not required.
    pub fn process(&mut self, event: &DeviceEvent) -> MatchState {
        if self.state == MatchState::Satisfied {
            return self.state;
        }

        if let Some(held) = self.required.get_mut(&event.key_code) {
            *held = event.action == KeyAction::NoteOn;
            if *held && self.required.values().all(|h| *h) {
                self.state = MatchState::Satisfied;
            }
        }
        self.state
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> MatchState {
        self.state
    }

    /// Returns whether every required key was held at the same time.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.state == MatchState::Satisfied
    }

    /// Returns the required key codes in ascending order.
    pub fn required_keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.required.keys().copied()
    }
}
