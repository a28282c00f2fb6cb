//! Turns the layout of a prompt into a display list and hands it to a renderer.
//!
//! A [Canvas] is a list of image assets to composite, in order, at pixel offsets. Building it is
//! pure: the [NotationPainter] only combines the layout computed by the
//! [NotationLayoutEngine](crate::layout::NotationLayoutEngine) with the asset keys and the geometry
//! read from the configuration. Loading the image files and putting pixels on a screen is left to
//! the implementations of [Renderer].

use serde::Serialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use ustr::{Ustr, UstrMap};

use crate::{
    data::Prompt,
    error::{ConfigurationError, RenderError, SessionError},
    layout::{NotationLayoutEngine, PositionTable},
    properties::Properties,
};

/// The prefix of the properties holding the path of each image asset.
pub const ASSET_PREFIX: &str = "Asset_";

/// The asset drawn behind every prompt.
pub const STAFF_ASSET: &str = "Staff";

/// The glyph of a note in a prompt waiting for an answer.
pub const NOTE_ASSET: &str = "Note";

/// The glyph of a note once the answer is revealed.
pub const ANSWER_NOTE_ASSET: &str = "NoteAnswer";

/// The prefix of the key signature assets, followed by the key of the prompt.
pub const KEY_SIGNATURE_PREFIX: &str = "KeySignature_";

/// How the notes of a prompt are drawn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Styling {
    /// The prompt is waiting for an answer.
    Question,

    /// The prompt was answered and the answer is revealed.
    Answer,
}

/// An asset composited onto a canvas.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Layer {
    /// The key of the asset.
    pub asset: Ustr,

    /// The horizontal offset of the asset's top-left corner.
    pub x: u32,

    /// The vertical offset of the asset's top-left corner.
    pub y: u32,
}

/// A display list describing a fully composed prompt.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Canvas {
    /// The ID of the prompt drawn on the canvas.
    pub prompt_id: Ustr,

    /// The styling of the notes.
    pub styling: Styling,

    /// The width of the canvas before scaling.
    pub width: u32,

    /// The height of the canvas before scaling.
    pub height: u32,

    /// The factor by which the canvas is scaled to fit the window.
    pub scale: f64,

    /// The assets to composite, in order.
    pub layers: Vec<Layer>,
}

impl Canvas {
    /// Creates an empty canvas of the given size.
    pub fn new(prompt_id: Ustr, styling: Styling, width: u32, height: u32) -> Self {
        Self {
            prompt_id,
            styling,
            width,
            height,
            scale: 1.0,
            layers: Vec::new(),
        }
    }

    /// Composites an asset at the given offset on top of the existing layers.
    pub fn composite(&mut self, asset: Ustr, x: u32, y: u32) {
        self.layers.push(Layer { asset, x, y });
    }

    /// Sets the scale so that the whole canvas fits in a window of the given size while keeping
    /// its aspect ratio.
    pub fn scale_to_fit(&mut self, window_width: u32, window_height: u32) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let horizontal = f64::from(window_width) / f64::from(self.width);
        let vertical = f64::from(window_height) / f64::from(self.height);
        self.scale = horizontal.min(vertical);
    }
}

/// The fixed geometry of the canvas and the window, read from the configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CanvasGeometry {
    /// The height of a note glyph.
    pub glyph_height: u32,

    /// The width of the canvas.
    pub canvas_width: u32,

    /// The height of the canvas when no note falls below it.
    pub canvas_height: u32,

    /// The horizontal offset at which notes are drawn.
    pub note_x: u32,

    /// The width of the window.
    pub window_width: u32,

    /// The height of the window.
    pub window_height: u32,
}

impl CanvasGeometry {
    /// Reads the geometry from the properties.
    pub fn from_properties(properties: &dyn Properties) -> Result<Self, ConfigurationError> {
        Ok(Self {
            glyph_height: properties.require_u32("GlyphHeight")?,
            canvas_width: properties.require_u32("CanvasWidth")?,
            canvas_height: properties.require_u32("CanvasHeight")?,
            note_x: properties.require_u32("NoteX")?,
            window_width: properties.require_u32("WindowWidth")?,
            window_height: properties.require_u32("WindowHeight")?,
        })
    }
}

/// Builds the canvas of a prompt.
#[derive(Clone, Debug)]
pub struct NotationPainter {
    /// The engine used to lay out the notes.
    engine: NotationLayoutEngine,

    /// The offset of every note position.
    positions: PositionTable,

    /// The geometry of the canvas and the window.
    geometry: CanvasGeometry,
}

impl NotationPainter {
    #[allow(missing_docs)]
    pub fn new(
        engine: NotationLayoutEngine,
        positions: PositionTable,
        geometry: CanvasGeometry,
    ) -> Self {
        Self {
            engine,
            positions,
            geometry,
        }
    }

    /// Returns the canvas of the given prompt drawn with the given styling.
    pub fn paint(&self, prompt: &Prompt, styling: Styling) -> Result<Canvas, SessionError> {
        let (id, key, notes) = match prompt {
            Prompt::Score { id, key, notes } => (*id, *key, notes),
            Prompt::Chord { id, .. } | Prompt::Sound { id, .. } => {
                return Err(SessionError::UnsupportedPrompt(
                    *id,
                    prompt.kind().to_string(),
                ));
            }
        };

        let layout = self.engine.layout(
            notes,
            &self.positions,
            self.geometry.glyph_height,
            self.geometry.canvas_height,
        )?;

        let mut canvas = Canvas::new(id, styling, self.geometry.canvas_width, layout.canvas_height);
        canvas.composite(Ustr::from(STAFF_ASSET), 0, 0);
        canvas.composite(Ustr::from(format!("{KEY_SIGNATURE_PREFIX}{key}").as_str()), 0, 0);
        for ledger_id in layout.ledger_lines.iter() {
            canvas.composite(*ledger_id, 0, 0);
        }

        let note_asset = match styling {
            Styling::Question => Ustr::from(NOTE_ASSET),
            Styling::Answer => Ustr::from(ANSWER_NOTE_ASSET),
        };
        for offset in layout.offsets {
            canvas.composite(note_asset, self.geometry.note_x, offset);
        }

        canvas.scale_to_fit(self.geometry.window_width, self.geometry.window_height);
        Ok(canvas)
    }
}

/// Draws canvases on some kind of display.
pub trait Renderer {
    /// Loads the image asset with the given key from the given path.
    fn load_asset(&mut self, key: Ustr, path: &Path) -> Result<(), RenderError>;

    /// Composes the canvas from its loaded assets and shows it.
    fn present(&mut self, canvas: &Canvas) -> Result<(), RenderError>;
}

/// Loads every asset listed in the properties into the renderer.
pub fn load_assets(
    renderer: &mut dyn Renderer,
    properties: &dyn Properties,
    root: &Path,
) -> Result<usize, SessionError> {
    let assets = properties.entries_with_prefix(ASSET_PREFIX);
    for (key, path) in &assets {
        renderer.load_asset(Ustr::from(&key[ASSET_PREFIX.len()..]), &root.join(path))?;
    }
    Ok(assets.len())
}

/// A renderer that writes every presented canvas as a line of JSON, with each asset key replaced
/// by the path of its image. Used to run sightkeys without a graphical display.
pub struct DisplayListRenderer<W: Write> {
    /// A map of asset keys to the paths of their images.
    assets: UstrMap<PathBuf>,

    /// The destination of the display lists.
    writer: W,
}

/// A layer as written by [DisplayListRenderer].
#[derive(Serialize)]
struct ResolvedLayer<'a> {
    asset: &'a Path,
    x: u32,
    y: u32,
}

/// A canvas as written by [DisplayListRenderer].
#[derive(Serialize)]
struct ResolvedCanvas<'a> {
    prompt_id: Ustr,
    styling: Styling,
    width: u32,
    height: u32,
    scale: f64,
    layers: Vec<ResolvedLayer<'a>>,
}

impl<W: Write> DisplayListRenderer<W> {
    /// Creates a renderer writing to the given destination.
    pub fn new(writer: W) -> Self {
        Self {
            assets: UstrMap::default(),
            writer,
        }
    }

    /// Consumes the renderer and returns its destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Renderer for DisplayListRenderer<W> {
    fn load_asset(&mut self, key: Ustr, path: &Path) -> Result<(), RenderError> {
        std::fs::metadata(path).map_err(|e| RenderError::LoadAsset(key, path.to_path_buf(), e))?;
        self.assets.insert(key, path.to_path_buf());
        Ok(())
    }

    fn present(&mut self, canvas: &Canvas) -> Result<(), RenderError> {
        let layers = canvas
            .layers
            .iter()
            .map(|layer| {
                self.assets
                    .get(&layer.asset)
                    .map(|path| ResolvedLayer {
                        asset: path,
                        x: layer.x,
                        y: layer.y,
                    })
                    .ok_or(RenderError::MissingAsset(layer.asset))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let resolved = ResolvedCanvas {
            prompt_id: canvas.prompt_id,
            styling: canvas.styling,
            width: canvas.width,
            height: canvas.height,
            scale: canvas.scale,
            layers,
        };

        let line = serde_json::to_string(&resolved)
            .map_err(|e| RenderError::Present(anyhow::Error::from(e)))?;
        writeln!(self.writer, "{line}").map_err(|e| RenderError::Present(e.into()))?;
        self.writer
            .flush()
            .map_err(|e| RenderError::Present(e.into()))
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use ustr::Ustr;

    use super::*;
    use crate::{
        data::{Note, Step},
        layout::ledger_ids::{ABOVE_1, MIDDLE_C_UPPER},
        properties::LocalProperties,
    };

    fn geometry() -> CanvasGeometry {
        CanvasGeometry {
            glyph_height: 30,
            canvas_width: 300,
            canvas_height: 210,
            note_x: 140,
            window_width: 600,
            window_height: 400,
        }
    }

    fn painter() -> NotationPainter {
        NotationPainter::new(
            NotationLayoutEngine::default(),
            PositionTable::from_pairs(&[("C4_Upper", 85), ("A5", 37), ("C1", 185)]),
            geometry(),
        )
    }

    fn asset_keys(canvas: &Canvas) -> Vec<&str> {
        canvas.layers.iter().map(|l| l.asset.as_str()).collect()
    }

    /// Verifies painting a score prompt in both stylings.
    #[test]
    fn paint_score() -> Result<()> {
        let prompt = Prompt::Score {
            id: Ustr::from("Score_CM_C4_A5"),
            key: Ustr::from("CM"),
            notes: vec![Note::with_step("C4", Step::Upper), Note::new("A5")],
        };

        let canvas = painter().paint(&prompt, Styling::Question)?;
        assert_eq!(
            asset_keys(&canvas),
            vec![
                STAFF_ASSET,
                "KeySignature_CM",
                MIDDLE_C_UPPER,
                ABOVE_1,
                NOTE_ASSET,
                NOTE_ASSET
            ]
        );
        assert_eq!(canvas.layers[4], Layer {
            asset: Ustr::from(NOTE_ASSET),
            x: 140,
            y: 85
        });
        assert_eq!((canvas.width, canvas.height), (300, 210));
        assert_eq!(canvas.scale, 400.0 / 210.0);

        let canvas = painter().paint(&prompt, Styling::Answer)?;
        assert_eq!(canvas.styling, Styling::Answer);
        assert_eq!(canvas.layers[5].asset, Ustr::from(ANSWER_NOTE_ASSET));
        Ok(())
    }

    /// Verifies that a low note grows the painted canvas.
    #[test]
    fn paint_grown_canvas() -> Result<()> {
        let prompt = Prompt::Score {
            id: Ustr::from("low"),
            key: Ustr::from("CM"),
            notes: vec![Note::new("C1")],
        };
        let canvas = painter().paint(&prompt, Styling::Question)?;
        assert_eq!(canvas.height, 215);
        Ok(())
    }

    /// Verifies that chord and sound prompts are not supported yet.
    #[test]
    fn paint_unsupported() {
        let chord = Prompt::Chord {
            id: Ustr::from("Chord_C"),
            chord: "C".to_string(),
            notes: vec![Note::new("C4")],
        };
        assert!(matches!(
            painter().paint(&chord, Styling::Question),
            Err(SessionError::UnsupportedPrompt(_, kind)) if kind == "chord"
        ));
        let sound = Prompt::Sound {
            id: Ustr::from("Sound_C"),
            notes: vec![],
        };
        assert!(painter().paint(&sound, Styling::Question).is_err());
    }

    /// Verifies reading the geometry from the properties.
    #[test]
    fn geometry_from_properties() -> Result<()> {
        let properties = LocalProperties::from_pairs([
            ("GlyphHeight", "30"),
            ("CanvasWidth", "300"),
            ("CanvasHeight", "210"),
            ("NoteX", "140"),
            ("WindowWidth", "600"),
            ("WindowHeight", "400"),
        ]);
        assert_eq!(CanvasGeometry::from_properties(&properties)?, geometry());
        Ok(())
    }

    /// Verifies loading assets and presenting a canvas as a display list.
    #[test]
    fn display_list_renderer() -> Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join("staff.png"), b"")?;
        std::fs::write(temp_dir.path().join("note.png"), b"")?;
        let properties = LocalProperties::from_pairs([
            ("Asset_Staff", "staff.png"),
            ("Asset_Note", "note.png"),
        ]);

        let mut renderer = DisplayListRenderer::new(Vec::new());
        assert_eq!(load_assets(&mut renderer, &properties, temp_dir.path())?, 2);

        let mut canvas = Canvas::new(Ustr::from("p"), Styling::Question, 300, 200);
        canvas.composite(Ustr::from(STAFF_ASSET), 0, 0);
        canvas.composite(Ustr::from(NOTE_ASSET), 140, 41);
        renderer.present(&canvas)?;

        canvas.composite(Ustr::from(ANSWER_NOTE_ASSET), 140, 41);
        assert!(matches!(
            renderer.present(&canvas),
            Err(RenderError::MissingAsset(_))
        ));

        let output = String::from_utf8(renderer.into_inner())?;
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(value["prompt_id"], "p");
        assert_eq!(value["layers"][1]["y"], 41);
        assert!(
            value["layers"][1]["asset"]
                .as_str()
                .unwrap()
                .ends_with("note.png")
        );
        Ok(())
    }

    /// Verifies that missing asset files cannot be loaded.
    #[test]
    fn missing_asset_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let properties = LocalProperties::from_pairs([("Asset_Staff", "staff.png")]);
        let mut renderer = DisplayListRenderer::new(Vec::new());
        assert!(matches!(
            load_assets(&mut renderer, &properties, temp_dir.path()),
            Err(SessionError::Render(RenderError::LoadAsset(..)))
        ));
        Ok(())
    }
}
