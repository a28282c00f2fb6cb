//! Runs a practice session from the library in the current directory.
//!
//! Prompts are written to the standard output as display lists, one JSON line per canvas, and a
//! `q` line on the standard input ends the session.

use anyhow::{Context, Result};
use log::LevelFilter;
use std::{env, io, process::ExitCode};

use sightkeys::{
    PracticeLibrary,
    device::{discover_devices, open_raw_midi, select_device},
    render::DisplayListRenderer,
    session::{SessionIo, SessionOutcome},
    window::LineWindow,
};

/// Selects the MIDI device, builds the collaborators of the session and runs it.
fn run(library: &PracticeLibrary) -> Result<SessionOutcome> {
    let devices = discover_devices(&library.device_directory());
    for device in &devices {
        log::info!(
            "found MIDI device {} named {} (input: {})",
            device.id,
            device.name,
            device.input
        );
    }
    let device = select_device(&devices, library.device_id()?)?;
    log::info!("reading from MIDI device {}", device.path.display());
    let mut input = open_raw_midi(&device.path)?;

    let mut renderer = DisplayListRenderer::new(io::stdout());
    let assets = library
        .load_assets(&mut renderer)
        .context("cannot load the image assets")?;
    log::info!("loaded {assets} assets");
    let mut window = LineWindow::stdin();

    let mut session = library.new_session()?;
    let outcome = session.run(&mut SessionIo {
        renderer: &mut renderer,
        input: &mut input,
        window: &mut window,
    })?;
    Ok(outcome)
}

fn main() -> ExitCode {
    // The logger is installed before the catalog is read so that its notices are kept.
    let opened = env::current_dir()
        .context("cannot read the current directory")
        .and_then(|root| PracticeLibrary::open_with_logging(&root, LevelFilter::Info));
    let (library, _logger) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(&library) {
        Ok(outcome) => {
            log::info!("session ended: {outcome:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
