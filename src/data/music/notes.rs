//! Defines the notes and accidentals used to resolve note names into MIDI key numbers.

use std::{fmt, str::FromStr};

/// Defines the names of the natural notes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NaturalNote {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl NaturalNote {
    /// Returns the number of semitones between C and this note in the same octave.
    #[must_use]
    pub fn semitones_from_c(&self) -> i32 {
        match self {
            NaturalNote::C => 0,
            NaturalNote::D => 2,
            NaturalNote::E => 4,
            NaturalNote::F => 5,
            NaturalNote::G => 7,
            NaturalNote::A => 9,
            NaturalNote::B => 11,
        }
    }

    fn from_char(c: char) -> Option<NaturalNote> {
        match c.to_ascii_uppercase() {
            'A' => Some(NaturalNote::A),
            'B' => Some(NaturalNote::B),
            'C' => Some(NaturalNote::C),
            'D' => Some(NaturalNote::D),
            'E' => Some(NaturalNote::E),
            'F' => Some(NaturalNote::F),
            'G' => Some(NaturalNote::G),
            _ => None,
        }
    }
}

impl fmt::Display for NaturalNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NaturalNote::A => "A",
            NaturalNote::B => "B",
            NaturalNote::C => "C",
            NaturalNote::D => "D",
            NaturalNote::E => "E",
            NaturalNote::F => "F",
            NaturalNote::G => "G",
        };
        f.write_str(name)
    }
}

/// Defines the pitch accidentals that can be applied to a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Accidental {
    Natural,
    Flat,
    Sharp,
}

impl Accidental {
    /// Returns the number of semitones the accidental adds to the natural note.
    #[must_use]
    pub fn offset(&self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Flat => -1,
            Accidental::Sharp => 1,
        }
    }
}

impl fmt::Display for Accidental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accidental::Natural => Ok(()),
            Accidental::Flat => f.write_str("♭"),
            Accidental::Sharp => f.write_str("♯"),
        }
    }
}

/// A natural note in a specific octave with an accidental, written in scientific pitch notation.
/// Middle C is `C4`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pitch {
    /// The natural note.
    pub natural: NaturalNote,

    /// The accidental applied to the natural note.
    pub accidental: Accidental,

    /// The octave number.
    pub octave: i32,
}

impl Pitch {
    /// Returns the MIDI key number of the pitch, or `None` if it falls outside the MIDI range.
    #[must_use]
    pub fn midi_key(&self) -> Option<u8> {
        // MIDI key 60 is C4, so C-1 is key 0.
        let key = self
            .octave
            .checked_add(1)?
            .checked_mul(12)?
            .checked_add(self.natural.semitones_from_c() + self.accidental.offset())?;
        u8::try_from(key).ok().filter(|k| *k <= 127)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.natural, self.accidental, self.octave)
    }
}

/// The error returned when a string is not a valid pitch name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsePitchError(pub String);

impl fmt::Display for ParsePitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pitch name {:?}", self.0)
    }
}

impl std::error::Error for ParsePitchError {}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    /// Parses names such as `C4`, `F#3`, `Bb5`, `B♭5`, or `E♯-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePitchError(s.to_string());
        let mut chars = s.chars();
        let natural = chars
            .next()
            .and_then(NaturalNote::from_char)
            .ok_or_else(err)?;

        let rest = chars.as_str();
        let (accidental, octave) = if let Some(octave) = rest.strip_prefix(['#', '♯']) {
            (Accidental::Sharp, octave)
        } else if let Some(octave) = rest.strip_prefix(['b', '♭']) {
            (Accidental::Flat, octave)
        } else {
            (Accidental::Natural, rest)
        };
        let octave = octave.parse::<i32>().map_err(|_| err())?;
        Ok(Pitch {
            natural,
            accidental,
            octave,
        })
    }
}
