//! Tests the startup of a library the way the binary does it, with the global logger installed
//! before the catalog is read. The global logger can only be installed once per process, so this
//! file holds a single test.

use anyhow::Result;
use log::LevelFilter;
use pretty_assertions::assert_eq;
use sightkeys::{
    PracticeLibrary,
    catalog::PromptCatalog,
    data::{Note, Pool, Prompt},
    testutil::*,
};
use std::fs;
use tempfile::TempDir;
use ustr::Ustr;

/// Verifies that the notices and warnings of the catalog loader are written to the log file.
#[test]
fn catalog_notices_logged() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let prompts = vec![
        Prompt::Score {
            id: Ustr::from("Score_CM_C5"),
            key: Ustr::from("CM"),
            notes: vec![Note::new("C5")],
        },
        Prompt::Chord {
            id: Ustr::from("Chord_C"),
            chord: "C".to_string(),
            notes: vec![Note::new("C4")],
        },
    ];
    let pools = vec![
        Pool::sequential("basics", &[("Score_CM_C5", 1)]),
        Pool::sequential("chords", &[("Chord_C", 1)]),
    ];
    write_library(temp_dir.path(), &sample_properties(), &prompts, &pools)?;
    fs::write(
        temp_dir.path().join("cases/rhythm.json"),
        r#"[{"id": "Rhythm_1", "type": "rhythm", "notes": []}]"#,
    )?;

    let (library, guard) = PracticeLibrary::open_with_logging(temp_dir.path(), LevelFilter::Info)?;
    assert_eq!(library.catalog().read().get_prompt_ids().len(), 2);
    drop(guard);

    let contents = fs::read_to_string(library.log_file())?;
    let lines: Vec<&str> = contents.lines().collect();
    let skipped = lines
        .iter()
        .position(|line| line.contains("][INFO] skipping prompt Rhythm_1 with unknown type"));
    let loaded = lines
        .iter()
        .position(|line| line.contains("][INFO] loaded 2 prompts and 2 pools"));
    assert!(skipped.is_some(), "notice missing from log:\n{contents}");
    assert!(skipped < loaded);
    assert!(
        lines
            .iter()
            .any(|line| line.contains("][WARN] pool chords contains prompt Chord_C")),
        "warning missing from log:\n{contents}"
    );
    Ok(())
}
