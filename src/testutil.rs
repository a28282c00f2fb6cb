//! Contains utilities common to sightkeys tests.
//!
//! This module contains a sample configuration covering the whole grand staff, a function to write
//! a practice library to disk, and scripted implementations of the collaborators of a session so
//! that the end-to-end tests can drive the practice loop without a keyboard or a display.

use anyhow::{Context, Result};
use std::{collections::VecDeque, fs, path::Path};
use ustr::Ustr;

use crate::{
    PROPERTIES_PATH,
    data::{Pool, Prompt, PromptRecord},
    device::{DeviceEvent, InputDevice},
    error::{DeviceError, RenderError},
    layout::{NotationLayoutEngine, POSITION_PREFIX, PositionTable, ledger_ids},
    properties::LocalProperties,
    render::{
        ANSWER_NOTE_ASSET, ASSET_PREFIX, Canvas, CanvasGeometry, KEY_SIGNATURE_PREFIX, NOTE_ASSET,
        NotationPainter, Renderer, STAFF_ASSET,
    },
    window::{WindowEvent, WindowEvents},
};

/// The offset of every note position on the sample grand staff. Each diatonic step is four pixels
/// apart and the center of a note head lies five pixels below its offset.
pub const SAMPLE_POSITIONS: [(&str, u32); 46] = [
    ("C7", 1),
    ("B6", 5),
    ("A6", 9),
    ("G6", 13),
    ("F6", 17),
    ("E6", 21),
    ("D6", 25),
    ("C6", 29),
    ("B5", 33),
    ("A5", 37),
    ("G5", 41),
    ("F5", 45),
    ("E5", 49),
    ("D5", 53),
    ("C5", 57),
    ("B4", 61),
    ("A4", 65),
    ("G4", 69),
    ("F4", 73),
    ("E4", 77),
    ("D4", 81),
    ("C4_Upper", 85),
    ("B3_Upper", 89),
    ("D4_Lower", 97),
    ("C4_Lower", 101),
    ("B3", 105),
    ("A3", 109),
    ("G3", 113),
    ("F3", 117),
    ("E3", 121),
    ("D3", 125),
    ("C3", 129),
    ("B2", 133),
    ("A2", 137),
    ("G2", 141),
    ("F2", 145),
    ("E2", 149),
    ("D2", 153),
    ("C2", 157),
    ("B1", 161),
    ("A1", 165),
    ("G1", 169),
    ("F1", 173),
    ("E1", 177),
    ("D1", 181),
    ("C1", 185),
];

/// The geometry of the sample canvas and window.
pub const SAMPLE_GEOMETRY: CanvasGeometry = CanvasGeometry {
    glyph_height: 30,
    canvas_width: 300,
    canvas_height: 210,
    note_x: 140,
    window_width: 600,
    window_height: 400,
};

/// The key signatures with an asset in the sample configuration.
pub const SAMPLE_KEY_SIGNATURES: [&str; 3] = ["CM", "GM", "FM"];

/// Returns the keys of all the assets in the sample configuration.
pub fn sample_asset_keys() -> Vec<String> {
    let mut keys = vec![
        STAFF_ASSET.to_string(),
        NOTE_ASSET.to_string(),
        ANSWER_NOTE_ASSET.to_string(),
    ];
    keys.extend(
        SAMPLE_KEY_SIGNATURES
            .iter()
            .map(|key| format!("{KEY_SIGNATURE_PREFIX}{key}")),
    );
    keys.extend(
        [
            ledger_ids::ABOVE_1,
            ledger_ids::ABOVE_2,
            ledger_ids::ABOVE_3,
            ledger_ids::ABOVE_4,
            ledger_ids::ABOVE_5,
            ledger_ids::MIDDLE_C_UPPER,
            ledger_ids::MIDDLE_C_LOWER,
            ledger_ids::BELOW_1,
            ledger_ids::BELOW_2,
            ledger_ids::BELOW_3,
            ledger_ids::BELOW_4,
            ledger_ids::BELOW_5,
        ]
        .iter()
        .map(|id| (*id).to_string()),
    );
    keys
}

/// Returns the sample configuration, with asset paths relative to the library root and no waiting
/// between ticks or during the reveal.
pub fn sample_properties() -> LocalProperties {
    let mut properties = LocalProperties::default();
    for (note, offset) in SAMPLE_POSITIONS {
        properties.set(&format!("{POSITION_PREFIX}{note}"), &offset.to_string());
    }
    for key in sample_asset_keys() {
        properties.set(&format!("{ASSET_PREFIX}{key}"), &format!("assets/{key}.png"));
    }

    let geometry = SAMPLE_GEOMETRY;
    for (key, value) in [
        ("GlyphHeight", geometry.glyph_height),
        ("CanvasWidth", geometry.canvas_width),
        ("CanvasHeight", geometry.canvas_height),
        ("NoteX", geometry.note_x),
        ("WindowWidth", geometry.window_width),
        ("WindowHeight", geometry.window_height),
        ("TickMillis", 0),
        ("RevealMillis", 0),
    ] {
        properties.set(key, &value.to_string());
    }
    properties
}

/// Returns a painter using the sample positions and geometry.
pub fn sample_painter() -> NotationPainter {
    NotationPainter::new(
        NotationLayoutEngine::default(),
        PositionTable::from_pairs(&SAMPLE_POSITIONS),
        SAMPLE_GEOMETRY,
    )
}

/// Writes a practice library with the sample configuration and the given prompts and pools to the
/// given directory. Every asset is written as an empty file.
pub fn write_library(
    library_root: &Path,
    properties: &LocalProperties,
    prompts: &[Prompt],
    pools: &[Pool],
) -> Result<()> {
    let prompt_directory = library_root.join(crate::DEFAULT_PROMPT_DIRECTORY);
    let pool_directory = library_root.join(crate::DEFAULT_POOL_DIRECTORY);
    let asset_directory = library_root.join("assets");
    for directory in [&prompt_directory, &pool_directory, &asset_directory] {
        fs::create_dir_all(directory)
            .with_context(|| format!("cannot create directory {}", directory.display()))?;
    }

    properties.save(&library_root.join(PROPERTIES_PATH))?;
    for key in sample_asset_keys() {
        fs::write(asset_directory.join(format!("{key}.png")), b"")?;
    }

    let records: Vec<PromptRecord> = prompts.iter().map(PromptRecord::from).collect();
    fs::write(
        prompt_directory.join("prompts.json"),
        serde_json::to_string_pretty(&records)?,
    )?;
    for pool in pools {
        fs::write(
            pool_directory.join(format!("{}.json", pool.id)),
            serde_json::to_string_pretty(pool)?,
        )?;
    }
    Ok(())
}

/// An input device that replays a scripted list of event batches, one batch per poll. Polls past
/// the end of the script return no events.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    /// The batches not yet returned.
    batches: VecDeque<Vec<DeviceEvent>>,

    /// The number of times the device was polled.
    polls: usize,
}

impl ScriptedInput {
    #[allow(missing_docs)]
    pub fn new(batches: Vec<Vec<DeviceEvent>>) -> Self {
        Self {
            batches: batches.into(),
            polls: 0,
        }
    }

    /// Returns the number of times the device was polled.
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl InputDevice for ScriptedInput {
    fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError> {
        self.polls += 1;
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// A window that asks to quit on a given poll.
#[derive(Debug)]
pub struct ScriptedWindow {
    /// The number of polls without events before the quit. `None` if the window never quits.
    quit_after: Option<usize>,

    /// The number of times the window was polled.
    polls: usize,
}

impl ScriptedWindow {
    /// Creates a window that returns no events for the given number of polls and then asks to
    /// quit on every later poll.
    pub fn quit_after(polls: usize) -> Self {
        Self {
            quit_after: Some(polls),
            polls: 0,
        }
    }

    /// Creates a window that never asks to quit.
    pub fn never() -> Self {
        Self {
            quit_after: None,
            polls: 0,
        }
    }
}

impl WindowEvents for ScriptedWindow {
    fn poll(&mut self) -> Vec<WindowEvent> {
        let poll = self.polls;
        self.polls += 1;
        match self.quit_after {
            Some(quit_after) if poll >= quit_after => vec![WindowEvent::Quit],
            _ => vec![],
        }
    }
}

/// A renderer that keeps every loaded asset and every presented canvas.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    /// The keys of the loaded assets, in load order.
    loaded: Vec<Ustr>,

    /// The presented canvases, in order.
    presented: Vec<Canvas>,
}

impl RecordingRenderer {
    /// Returns the keys of the loaded assets.
    pub fn loaded(&self) -> &[Ustr] {
        &self.loaded
    }

    /// Returns the presented canvases.
    pub fn presented(&self) -> &[Canvas] {
        &self.presented
    }
}

impl Renderer for RecordingRenderer {
    fn load_asset(&mut self, key: Ustr, _path: &Path) -> Result<(), RenderError> {
        self.loaded.push(key);
        Ok(())
    }

    fn present(&mut self, canvas: &Canvas) -> Result<(), RenderError> {
        if let Some(layer) = canvas
            .layers
            .iter()
            .find(|layer| !self.loaded.is_empty() && !self.loaded.contains(&layer.asset))
        {
            return Err(RenderError::MissingAsset(layer.asset));
        }
        self.presented.push(canvas.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::{
        data::Note,
        layout::PositionTable,
        properties::Properties,
        testutil::*,
    };

    /// Verifies that the sample positions can be read back from the sample properties.
    #[test]
    fn sample_positions() -> Result<()> {
        let positions = PositionTable::from_properties(&sample_properties())?;
        assert_eq!(positions.offset_of(&Note::new("C7"))?, 1);
        assert_eq!(positions.offset_of(&Note::new("C1"))?, 185);
        Ok(())
    }

    /// Verifies writing a library to disk.
    #[test]
    fn write_sample_library() -> Result<()> {
        let temp_dir = TempDir::new()?;
        write_library(temp_dir.path(), &sample_properties(), &[], &[])?;
        let properties = LocalProperties::open(&temp_dir.path().join(PROPERTIES_PATH))?;
        assert_eq!(properties.get("NoteX"), Some("140".to_string()));
        assert!(temp_dir.path().join("assets/Staff.png").is_file());
        Ok(())
    }
}
