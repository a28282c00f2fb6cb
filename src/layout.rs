//! Computes the geometry needed to draw the notes of a prompt on the grand staff.
//!
//! The layout engine never touches pixels. Given the notes of a prompt, it returns the height of
//! the canvas required to fit them, the vertical offset of each note glyph, and the IDs of the
//! ledger-line assets that must be composited on top of the staff.
//!
//! The offsets of the note positions come from the configuration. The default ledger-line rules
//! assume the geometry of the bundled assets, in which the center of a note head lies five pixels
//! below the offset of its glyph and each diatonic step is four pixels tall:
//!
//! - Treble staff lines at head centers 50 (F5) to 82 (E4). Ledger lines above it at 42, 34, 26,
//!   18, and 10.
//! - Middle C written on the treble staff (`C4_Upper`) at 90, and on the bass staff (`C4_Lower`)
//!   at 106. Both share one coordinate space, so each has its own ledger line.
//! - Bass staff lines at 114 (A3) to 146 (G2). Ledger lines below it at 154, 162, 170, 178,
//!   and 186.

use std::collections::HashMap;

use ustr::Ustr;

use crate::{
    data::{Note, Step, music::notes::Pitch},
    error::ConfigurationError,
    properties::{Properties, parse_u32},
};

/// The prefix of the properties holding the offset of each note position.
pub const POSITION_PREFIX: &str = "Position_";

/// A map of position keys (`C5`, `C4_Upper`, ...) to the vertical offset of a note glyph drawn at
/// that position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionTable {
    positions: HashMap<String, u32>,
}

impl PositionTable {
    /// Builds the table from all the properties prefixed with `Position_`.
    pub fn from_properties(properties: &dyn Properties) -> Result<Self, ConfigurationError> {
        let mut positions = HashMap::new();
        for (key, value) in properties.entries_with_prefix(POSITION_PREFIX) {
            let offset = parse_u32(&key, &value)?;
            positions.insert(key[POSITION_PREFIX.len()..].to_string(), offset);
        }
        Ok(Self { positions })
    }

    /// Builds the table from the given `(key, offset)` pairs.
    pub fn from_pairs(pairs: &[(&str, u32)]) -> Self {
        Self {
            positions: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    /// Returns the offset of the given note. A note with an accidental and no position of its
    /// own is drawn at the position of its natural note.
    pub fn offset_of(&self, note: &Note) -> Result<u32, ConfigurationError> {
        let key = note.position_key();
        if let Some(offset) = self.positions.get(&key) {
            return Ok(*offset);
        }

        note.name
            .parse::<Pitch>()
            .ok()
            .map(|pitch| Note {
                name: format!("{}{}", pitch.natural, pitch.octave),
                step: note.step,
            })
            .and_then(|natural| self.positions.get(&natural.position_key()).copied())
            .ok_or(ConfigurationError::MissingPosition(key))
    }
}

/// The staff systems a mid-gap ledger rule applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepRule {
    /// Only notes written on the upper staff.
    Upper,

    /// Every note not written on the upper staff, including notes with no step at all.
    NotUpper,
}

impl StepRule {
    fn matches(&self, step: Option<Step>) -> bool {
        match self {
            StepRule::Upper => step == Some(Step::Upper),
            StepRule::NotUpper => step != Some(Step::Upper),
        }
    }
}

/// A condition on the offset of a note that requires a ledger line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LedgerPredicate {
    /// The note is drawn at or above the given offset.
    AtOrAbove(u32),

    /// The note is drawn at or below the given offset.
    AtOrBelow(u32),

    /// The note is written on the matching staff and drawn within the inclusive range of offsets.
    Gap {
        /// The staff systems the rule applies to.
        step: StepRule,

        /// The smallest matching offset.
        from: u32,

        /// The largest matching offset.
        to: u32,
    },
}

impl LedgerPredicate {
    /// Returns whether a note with the given step drawn at the given offset satisfies the
    /// predicate. Smaller offsets are higher on the canvas.
    #[must_use]
    pub fn matches(&self, offset: u32, step: Option<Step>) -> bool {
        match *self {
            LedgerPredicate::AtOrAbove(threshold) => offset <= threshold,
            LedgerPredicate::AtOrBelow(threshold) => offset >= threshold,
            LedgerPredicate::Gap { step: rule, from, to } => {
                rule.matches(step) && (from..=to).contains(&offset)
            }
        }
    }
}

/// A row of the ledger-line rule table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LedgerRule {
    /// The condition under which the ledger line is needed.
    pub predicate: LedgerPredicate,

    /// The ID of the ledger-line asset.
    pub ledger_id: &'static str,
}

#[allow(missing_docs)]
pub mod ledger_ids {
    pub const ABOVE_1: &str = "LedgerLine_Above_1";
    pub const ABOVE_2: &str = "LedgerLine_Above_2";
    pub const ABOVE_3: &str = "LedgerLine_Above_3";
    pub const ABOVE_4: &str = "LedgerLine_Above_4";
    pub const ABOVE_5: &str = "LedgerLine_Above_5";
    pub const MIDDLE_C_UPPER: &str = "LedgerLine_MiddleC_Upper";
    pub const MIDDLE_C_LOWER: &str = "LedgerLine_MiddleC_Lower";
    pub const BELOW_1: &str = "LedgerLine_Below_1";
    pub const BELOW_2: &str = "LedgerLine_Below_2";
    pub const BELOW_3: &str = "LedgerLine_Below_3";
    pub const BELOW_4: &str = "LedgerLine_Below_4";
    pub const BELOW_5: &str = "LedgerLine_Below_5";
}

/// The ledger-line rules for the bundled grand staff assets, evaluated in order for every note.
pub const DEFAULT_LEDGER_RULES: [LedgerRule; 12] = [
    LedgerRule {
        predicate: LedgerPredicate::AtOrAbove(37),
        ledger_id: ledger_ids::ABOVE_1,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrAbove(29),
        ledger_id: ledger_ids::ABOVE_2,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrAbove(21),
        ledger_id: ledger_ids::ABOVE_3,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrAbove(13),
        ledger_id: ledger_ids::ABOVE_4,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrAbove(5),
        ledger_id: ledger_ids::ABOVE_5,
    },
    LedgerRule {
        predicate: LedgerPredicate::Gap {
            step: StepRule::Upper,
            from: 85,
            to: 89,
        },
        ledger_id: ledger_ids::MIDDLE_C_UPPER,
    },
    LedgerRule {
        predicate: LedgerPredicate::Gap {
            step: StepRule::NotUpper,
            from: 97,
            to: 101,
        },
        ledger_id: ledger_ids::MIDDLE_C_LOWER,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrBelow(149),
        ledger_id: ledger_ids::BELOW_1,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrBelow(157),
        ledger_id: ledger_ids::BELOW_2,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrBelow(165),
        ledger_id: ledger_ids::BELOW_3,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrBelow(173),
        ledger_id: ledger_ids::BELOW_4,
    },
    LedgerRule {
        predicate: LedgerPredicate::AtOrBelow(181),
        ledger_id: ledger_ids::BELOW_5,
    },
];

/// An insertion-ordered set of ledger-line IDs. Inserting an ID that is already present does
/// nothing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LedgerLineSet {
    ids: Vec<Ustr>,
}

impl LedgerLineSet {
    /// Adds the ID to the set if not already present. Returns whether it was added.
    pub fn insert(&mut self, id: Ustr) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Returns whether the set contains the given ID.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i.as_str() == id)
    }

    /// Returns the IDs in the order in which they were first inserted.
    pub fn iter(&self) -> impl Iterator<Item = &Ustr> {
        self.ids.iter()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The result of laying out the notes of a prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Layout {
    /// The height of the canvas needed to fit every note.
    pub canvas_height: u32,

    /// The vertical offset of each note, in the order of the notes given to the engine.
    pub offsets: Vec<u32>,

    /// The ledger lines needed by the notes, in the order in which they were first required.
    pub ledger_lines: LedgerLineSet,
}

/// Lays out notes on the grand staff using an ordered table of ledger-line rules.
#[derive(Clone, Debug)]
pub struct NotationLayoutEngine {
    rules: Vec<LedgerRule>,
}

impl Default for NotationLayoutEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_RULES.to_vec())
    }
}

impl NotationLayoutEngine {
    /// Creates an engine that evaluates the given rules in order.
    pub fn new(rules: Vec<LedgerRule>) -> Self {
        Self { rules }
    }

    /// Lays out the given notes. The canvas grows beyond its nominal height only when a glyph
    /// would otherwise be cut off at the bottom, and then exactly enough to fit it.
    pub fn layout(
        &self,
        notes: &[Note],
        positions: &PositionTable,
        glyph_height: u32,
        nominal_canvas_height: u32,
    ) -> Result<Layout, ConfigurationError> {
        let offsets = notes
            .iter()
            .map(|note| positions.offset_of(note))
            .collect::<Result<Vec<_>, _>>()?;

        // The final height is known before any note is placed.
        let mut canvas_height = nominal_canvas_height;
        for (note, offset) in notes.iter().zip(&offsets) {
            let bottom = offset.checked_add(glyph_height).ok_or_else(|| {
                ConfigurationError::PositionOverflow(note.position_key(), *offset)
            })?;
            canvas_height = canvas_height.max(bottom);
        }

        let mut ledger_lines = LedgerLineSet::default();
        for (note, offset) in notes.iter().zip(&offsets) {
            for rule in &self.rules {
                if rule.predicate.matches(*offset, note.step) {
                    ledger_lines.insert(Ustr::from(rule.ledger_id));
                }
            }
        }

        Ok(Layout {
            canvas_height,
            offsets,
            ledger_lines,
        })
    }
}
