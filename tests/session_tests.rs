//! End-to-end tests that open a practice library written to disk and drive full sessions with a
//! scripted keyboard and window.
//!
//! The scheduler of weighted pools is random, so these tests either use sequential pools, whose
//! order is fixed, or a seeded random number generator and only check properties that hold for
//! every draw.

use anyhow::Result;
use pretty_assertions::assert_eq;
use rand::{SeedableRng, rngs::StdRng};
use sightkeys::{
    PracticeLibrary,
    data::{Note, Pool, Prompt, Step},
    device::DeviceEvent,
    layout::ledger_ids,
    render::{DisplayListRenderer, Styling},
    session::{SessionIo, SessionOutcome},
    testutil::*,
};
use tempfile::TempDir;
use ustr::Ustr;

fn score(id: &str, key: &str, notes: Vec<Note>) -> Prompt {
    Prompt::Score {
        id: Ustr::from(id),
        key: Ustr::from(key),
        notes,
    }
}

/// The prompts of the test library.
fn prompts() -> Vec<Prompt> {
    vec![
        score("Score_CM_C5", "CM", vec![Note::new("C5")]),
        score(
            "Score_CM_Triad",
            "CM",
            vec![
                Note::with_step("C4", Step::Upper),
                Note::new("E4"),
                Note::new("G4"),
            ],
        ),
        score("Score_GM_A5", "GM", vec![Note::new("A5")]),
        score("Score_FM_C1", "FM", vec![Note::new("C1")]),
        Prompt::Chord {
            id: Ustr::from("Chord_C"),
            chord: "C".to_string(),
            notes: vec![Note::new("C4")],
        },
    ]
}

/// The pools of the test library.
fn pools() -> Vec<Pool> {
    vec![
        Pool::sequential(
            "basics",
            &[("Score_CM_C5", 1), ("Score_CM_Triad", 1), ("Score_FM_C1", 1)],
        ),
        Pool::weighted("random", &[("Score_CM_C5", 1), ("Score_GM_A5", 3)]),
        Pool::sequential("chords", &[("Chord_C", 1)]),
    ]
}

/// Writes the test library with the given overrides of the sample configuration and opens it.
fn init_library(temp_dir: &TempDir, overrides: &[(&str, &str)]) -> Result<PracticeLibrary> {
    let mut properties = sample_properties();
    for (key, value) in overrides {
        properties.set(key, value);
    }
    write_library(temp_dir.path(), &properties, &prompts(), &pools())?;
    PracticeLibrary::new(temp_dir.path())
}

/// Verifies a full session over a sequential pool, answered correctly by the student.
#[test]
fn sequential_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let library = init_library(&temp_dir, &[("Suite", "basics"), ("PromptLimit", "3")])?;

    let mut renderer = RecordingRenderer::default();
    assert_eq!(library.load_assets(&mut renderer)?, sample_asset_keys().len());

    // The triad is played one key at a time while holding the earlier keys.
    let mut input = ScriptedInput::new(vec![
        vec![DeviceEvent::note_on(72)],
        vec![DeviceEvent::note_off(72)],
        vec![DeviceEvent::note_on(60)],
        vec![DeviceEvent::note_on(64)],
        vec![DeviceEvent::note_off(60), DeviceEvent::note_on(67)],
        vec![DeviceEvent::note_on(60)],
        vec![],
        vec![DeviceEvent::note_on(24)],
    ]);
    let mut window = ScriptedWindow::never();

    let mut session = library.new_session()?;
    let outcome = session.run(&mut SessionIo {
        renderer: &mut renderer,
        input: &mut input,
        window: &mut window,
    })?;
    assert_eq!(outcome, SessionOutcome::Completed(3));

    let presented = renderer.presented();
    let order: Vec<(&str, Styling)> = presented
        .iter()
        .map(|canvas| (canvas.prompt_id.as_str(), canvas.styling))
        .collect();
    assert_eq!(
        order,
        vec![
            ("Score_CM_C5", Styling::Question),
            ("Score_CM_C5", Styling::Answer),
            ("Score_CM_Triad", Styling::Question),
            ("Score_CM_Triad", Styling::Answer),
            ("Score_FM_C1", Styling::Question),
            ("Score_FM_C1", Styling::Answer),
        ]
    );

    // Middle C in the upper staff needs its own ledger line.
    let triad = &presented[2];
    assert!(
        triad
            .layers
            .iter()
            .any(|layer| layer.asset.as_str() == ledger_ids::MIDDLE_C_UPPER)
    );

    // The lowest C grows the canvas and needs all the ledger lines below the bass staff.
    let low_c = &presented[4];
    assert_eq!(low_c.height, 215);
    let ledger_lines: Vec<&str> = low_c
        .layers
        .iter()
        .map(|layer| layer.asset.as_str())
        .filter(|asset| asset.starts_with("LedgerLine_Below"))
        .collect();
    assert_eq!(ledger_lines.len(), 5);
    Ok(())
}

/// Verifies that a weighted pool only presents its own prompts and that the student can quit
/// while a prompt is waiting for an answer.
#[test]
fn weighted_session_cancelled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let library = init_library(&temp_dir, &[("Suite", "random")])?;
    let mut session = library.new_session_with_rng(StdRng::seed_from_u64(11))?;

    // Both prompts of the pool are answered by holding C5 and A5 at the same time.
    let batches: Vec<Vec<DeviceEvent>> = (0..20)
        .map(|_| {
            vec![
                DeviceEvent::note_on(72),
                DeviceEvent::note_on(81),
                DeviceEvent::note_off(72),
                DeviceEvent::note_off(81),
            ]
        })
        .collect();
    let mut input = ScriptedInput::new(batches);
    let mut renderer = RecordingRenderer::default();
    let mut window = ScriptedWindow::quit_after(30);

    let outcome = session.run(&mut SessionIo {
        renderer: &mut renderer,
        input: &mut input,
        window: &mut window,
    })?;
    let SessionOutcome::Cancelled(answered) = outcome else {
        panic!("expected the session to be cancelled, got {outcome:?}");
    };
    assert!(answered > 0);
    for canvas in renderer.presented() {
        assert!(
            ["Score_CM_C5", "Score_GM_A5"].contains(&canvas.prompt_id.as_str()),
            "unexpected prompt {}",
            canvas.prompt_id
        );
    }
    assert_eq!(session.state().active_pool, Ustr::from("random"));
    Ok(())
}

/// Verifies that the display-list renderer writes one line per presented canvas.
#[test]
fn display_list_session() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let library = init_library(&temp_dir, &[("Suite", "basics"), ("PromptLimit", "1")])?;

    let mut renderer = DisplayListRenderer::new(Vec::new());
    library.load_assets(&mut renderer)?;
    let mut input = ScriptedInput::new(vec![vec![DeviceEvent::note_on(72)]]);
    let mut window = ScriptedWindow::never();
    let mut session = library.new_session()?;
    session.run(&mut SessionIo {
        renderer: &mut renderer,
        input: &mut input,
        window: &mut window,
    })?;

    let output = String::from_utf8(renderer.into_inner())?;
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["prompt_id"], "Score_CM_C5");
    assert_eq!(lines[1]["styling"], "Answer");
    Ok(())
}

/// Verifies that prompts without a layout end the session with an error.
#[test]
fn unsupported_prompt() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let library = init_library(&temp_dir, &[("Suite", "chords")])?;
    let mut session = library.new_session()?;

    let mut renderer = RecordingRenderer::default();
    let mut input = ScriptedInput::new(vec![]);
    let mut window = ScriptedWindow::never();
    let result = session.run(&mut SessionIo {
        renderer: &mut renderer,
        input: &mut input,
        window: &mut window,
    });
    assert!(result.is_err());
    assert!(renderer.presented().is_empty());
    Ok(())
}

/// Verifies the errors returned when opening an invalid library.
#[test]
fn invalid_library() -> Result<()> {
    let temp_dir = TempDir::new()?;
    assert!(PracticeLibrary::new(&temp_dir.path().join("missing")).is_err());

    // No properties file.
    assert!(PracticeLibrary::new(temp_dir.path()).is_err());

    // A position is not a number.
    let mut properties = sample_properties();
    properties.set("Position_C5", "high");
    write_library(temp_dir.path(), &properties, &prompts(), &pools())?;
    assert!(PracticeLibrary::new(temp_dir.path()).is_err());

    // The suite does not exist.
    let library = init_library(&temp_dir, &[("Suite", "missing")])?;
    assert!(library.new_session().is_err());
    Ok(())
}

/// Verifies that the session starts with the first pool when no suite is configured.
#[test]
fn default_pool() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let library = init_library(&temp_dir, &[])?;
    assert_eq!(library.default_pool()?, Ustr::from("basics"));
    assert_eq!(library.device_id()?, None);
    assert!(library.log_file().ends_with("sightkeys.log"));
    Ok(())
}
