//! Defines the basic data structures used by sightkeys to describe the prompts shown to the
//! student, the pools from which they are drawn, and the state of a running session.
//!
//! Prompts and pools are read from JSON definition files as records and converted into the domain
//! types defined here once they have been validated.

pub mod music;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use ustr::Ustr;

use crate::error::ConfigurationError;

/// Distinguishes two overlapping staff systems that contain a note with the same name. For example,
/// middle C can be written as the first ledger line below the treble staff or as the first ledger
/// line above the bass staff.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
pub enum Step {
    /// The note belongs to the upper staff.
    Upper,

    /// The note belongs to the lower staff.
    Lower,
}

/// A single note in a prompt.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Note {
    /// The pitch class and octave of the note, for example `C5` or `F#3`.
    pub name: String,

    /// The staff system in which the note is written, if the name alone is ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

impl Note {
    /// Creates a note without a step qualifier.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            step: None,
        }
    }

    /// Creates a note written in the given staff system.
    pub fn with_step(name: &str, step: Step) -> Self {
        Self {
            name: name.to_string(),
            step: Some(step),
        }
    }

    /// Returns the key used to look up the vertical position of this note, for example `C5` or
    /// `C4_Upper`.
    #[must_use]
    pub fn position_key(&self) -> String {
        match self.step {
            None => self.name.clone(),
            Some(step) => format!("{}_{}", self.name, step),
        }
    }
}

/// The kinds of prompts that can appear in a definition file.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum PromptKind {
    /// A prompt written as notes on a staff.
    Score,

    /// A prompt given as a chord symbol.
    Chord,

    /// A prompt that is played back and must be recognized by ear.
    Sound,
}

/// A single practice item.
#[derive(Clone, Debug, PartialEq)]
pub enum Prompt {
    /// Notes written on the grand staff under the given key signature.
    Score {
        /// The unique ID of the prompt.
        id: Ustr,

        /// The key signature, used to select the key signature asset.
        key: Ustr,

        /// The notes the student must play together.
        notes: Vec<Note>,
    },

    /// A chord given by name. Not supported by the session yet.
    Chord {
        /// The unique ID of the prompt.
        id: Ustr,

        /// The name of the chord, for example `Cmaj7`.
        chord: String,

        /// The notes the student must play together.
        notes: Vec<Note>,
    },

    /// Notes played back to the student. Not supported by the session yet.
    Sound {
        /// The unique ID of the prompt.
        id: Ustr,

        /// The notes the student must play together.
        notes: Vec<Note>,
    },
}

impl Prompt {
    /// Returns the ID of the prompt.
    #[must_use]
    pub fn id(&self) -> Ustr {
        match self {
            Prompt::Score { id, .. } | Prompt::Chord { id, .. } | Prompt::Sound { id, .. } => *id,
        }
    }

    /// Returns the notes the student must play to answer the prompt.
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        match self {
            Prompt::Score { notes, .. }
            | Prompt::Chord { notes, .. }
            | Prompt::Sound { notes, .. } => notes,
        }
    }

    /// Whether a session can present the prompt. Only score prompts have a layout so far.
    #[must_use]
    pub fn is_presentable(&self) -> bool {
        matches!(self, Prompt::Score { .. })
    }

    /// Returns the kind of the prompt.
    #[must_use]
    pub fn kind(&self) -> PromptKind {
        match self {
            Prompt::Score { .. } => PromptKind::Score,
            Prompt::Chord { .. } => PromptKind::Chord,
            Prompt::Sound { .. } => PromptKind::Sound,
        }
    }
}

/// A note as it appears in a definition file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NoteRecord {
    /// The name of the note.
    pub name: String,

    /// The optional step qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
}

/// A prompt as it appears in a definition file. The type is kept as a free-form string so that
/// files containing prompt types unknown to this version can still be read.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PromptRecord {
    /// The unique ID of the prompt.
    pub id: String,

    /// The type of the prompt: `score`, `chord`, or `sound`.
    #[serde(rename = "type")]
    pub kind: String,

    /// The key signature of a score prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// The chord name of a chord prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord: Option<String>,

    /// The notes of the prompt.
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
}

impl PromptRecord {
    /// Converts the record into a prompt. Returns `Ok(None)` if the type of the prompt is not
    /// known, so that the caller can skip it. Score prompts must name their key signature and chord
    /// prompts their chord.
    pub fn into_prompt(self) -> Result<Option<Prompt>, ConfigurationError> {
        let Ok(kind) = self.kind.parse::<PromptKind>() else {
            return Ok(None);
        };

        let id = Ustr::from(self.id.as_str());
        let notes = self
            .notes
            .into_iter()
            .map(|n| Note {
                name: n.name,
                step: n.step,
            })
            .collect();
        let prompt = match kind {
            PromptKind::Score => Prompt::Score {
                id,
                key: Ustr::from(
                    self.key
                        .as_deref()
                        .ok_or_else(|| ConfigurationError::MissingField(id, "key".to_string()))?,
                ),
                notes,
            },
            PromptKind::Chord => Prompt::Chord {
                id,
                chord: self
                    .chord
                    .ok_or_else(|| ConfigurationError::MissingField(id, "chord".to_string()))?,
                notes,
            },
            PromptKind::Sound => Prompt::Sound { id, notes },
        };
        Ok(Some(prompt))
    }
}

impl From<&Prompt> for PromptRecord {
    fn from(prompt: &Prompt) -> Self {
        let (key, chord) = match prompt {
            Prompt::Score { key, .. } => (Some(key.to_string()), None),
            Prompt::Chord { chord, .. } => (None, Some(chord.clone())),
            Prompt::Sound { .. } => (None, None),
        };
        Self {
            id: prompt.id().to_string(),
            kind: prompt.kind().to_string(),
            key,
            chord,
            notes: prompt
                .notes()
                .iter()
                .map(|n| NoteRecord {
                    name: n.name.clone(),
                    step: n.step,
                })
                .collect(),
        }
    }
}

/// The way the scheduler draws prompts from a pool.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Prompts are drawn at random with probability proportional to their weight.
    #[default]
    Weighted,

    /// Prompts are presented in the declared order, wrapping around at the end. Weights are
    /// ignored.
    Sequential,
}

/// A prompt in a pool together with its weight.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PoolEntry {
    /// The ID of the prompt.
    pub prompt_id: Ustr,

    /// The relative weight of the prompt. Only used by weighted pools.
    #[serde(default = "default_weight")]
    pub weight: i64,
}

/// Entries in sequential pools are allowed to omit their weight.
fn default_weight() -> i64 {
    1
}

/// A named collection of prompts from which the session draws. Also called a suite.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pool {
    /// The unique ID of the pool.
    pub id: Ustr,

    /// How prompts are drawn from the pool.
    #[serde(default)]
    pub mode: SelectionMode,

    /// The prompts in the pool, in declared order.
    pub entries: Vec<PoolEntry>,
}

impl Pool {
    /// Creates a weighted pool from the given `(prompt_id, weight)` pairs.
    pub fn weighted(id: &str, entries: &[(&str, i64)]) -> Self {
        Self::from_pairs(id, SelectionMode::Weighted, entries)
    }

    /// Creates a sequential pool from the given `(prompt_id, weight)` pairs.
    pub fn sequential(id: &str, entries: &[(&str, i64)]) -> Self {
        Self::from_pairs(id, SelectionMode::Sequential, entries)
    }

    fn from_pairs(id: &str, mode: SelectionMode, entries: &[(&str, i64)]) -> Self {
        Self {
            id: Ustr::from(id),
            mode,
            entries: entries
                .iter()
                .map(|(prompt_id, weight)| PoolEntry {
                    prompt_id: Ustr::from(prompt_id),
                    weight: *weight,
                })
                .collect(),
        }
    }

    /// Returns the sum of the weights of all the entries.
    #[must_use]
    pub fn total_weight(&self) -> Result<i64, ConfigurationError> {
        self.entries.iter().try_fold(0i64, |total, e| {
            total
                .checked_add(e.weight)
                .ok_or(ConfigurationError::WeightOverflow(self.id))
        })
    }

    /// Verifies that the pool can be drawn from. The entries must not be empty and, in weighted
    /// mode, every weight must be positive and their sum must fit in an `i64`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.entries.is_empty() {
            return Err(ConfigurationError::EmptyPool(self.id));
        }
        if self.mode == SelectionMode::Weighted {
            if let Some(entry) = self.entries.iter().find(|e| e.weight <= 0) {
                return Err(ConfigurationError::NonPositiveWeight(
                    self.id,
                    entry.prompt_id,
                    entry.weight,
                ));
            }
            self.total_weight()?;
        }
        Ok(())
    }
}

/// The mutable state of a running session. Owned by the session controller and updated once per
/// iteration of the practice loop.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    /// The prompt currently shown to the student.
    pub current_prompt: Option<Ustr>,

    /// The prompt shown in the previous iteration.
    pub previous_prompt: Option<Ustr>,

    /// The pool from which prompts are drawn.
    pub active_pool: Ustr,

    /// The index of the last entry returned from a sequential pool. `None` before the first draw.
    pub sequential_cursor: Option<usize>,
}

impl SessionState {
    /// Creates the state of a session drawing from the given pool.
    pub fn new(active_pool: Ustr) -> Self {
        Self {
            current_prompt: None,
            previous_prompt: None,
            active_pool,
            sequential_cursor: None,
        }
    }

    /// Records that the given prompt is now being presented.
    pub fn advance(&mut self, prompt_id: Ustr) {
        self.previous_prompt = self.current_prompt.replace(prompt_id);
    }

    /// Changes the active pool. The sequential cursor restarts from the first entry.
    pub fn switch_pool(&mut self, pool_id: Ustr) {
        if self.active_pool != pool_id {
            self.active_pool = pool_id;
            self.sequential_cursor = None;
        }
    }
}
