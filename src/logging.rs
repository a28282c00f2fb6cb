//! Writes the log of a practice session to an append-only file.
//!
//! Every line has the form `[YYYYMMDD-HHMMSS-ffffff][LEVEL] message`, with the timestamp in local
//! time. The logger is installed as the global `log` logger, so the rest of the crate logs through
//! the usual `log` macros.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

/// The format of the timestamp at the start of each line.
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Formats a single log line, without the trailing newline.
#[must_use]
pub fn format_line(timestamp: &DateTime<Local>, level: Level, message: &str) -> String {
    format!(
        "[{}][{}] {}",
        timestamp.format(TIMESTAMP_FORMAT),
        level,
        message
    )
}

/// A logger that appends formatted lines to a file.
pub struct FileLogger {
    /// The most verbose level written to the file.
    level: LevelFilter,

    /// The open log file.
    writer: Mutex<BufWriter<File>>,
}

impl FileLogger {
    /// Opens the log file at the given path for appending, creating it if needed.
    pub fn open(path: &Path, level: LevelFilter) -> Result<FileLogger> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Ok(FileLogger {
            level,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(&Local::now(), record.level(), &record.args().to_string());

        // A failed write cannot be logged anywhere else, so it is dropped.
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{line}");
    }

    fn flush(&self) {
        let _ = self.writer.lock().flush();
    }
}

/// Flushes the global logger when dropped. Returned by [init] and held for the lifetime of the
/// program.
#[must_use]
pub struct LoggerGuard {
    _private: (),
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        log::logger().flush();
    }
}

/// Installs a [FileLogger] writing to the given path as the global logger.
pub fn init(path: &Path, level: LevelFilter) -> Result<LoggerGuard> {
    let logger = FileLogger::open(path, level)?;
    log::set_boxed_logger(Box::new(logger)).context("a global logger is already installed")?;
    log::set_max_level(level);
    Ok(LoggerGuard { _private: () })
}
