//! Log writer module
//!
//! Builds the output targets for the tracing subscriber: a file when a path
//! is configured, otherwise stdout (access log) or stderr (everything else).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Stream used when no log file is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Stdout,
    Stderr,
}

/// Create a writer for the given optional file path
pub fn make_writer(path: Option<&str>, fallback: Fallback) -> io::Result<BoxMakeWriter> {
    Ok(match (path, fallback) {
        (Some(p), _) => BoxMakeWriter::new(Mutex::new(open_log_file(p)?)),
        (None, Fallback::Stdout) => BoxMakeWriter::new(io::stdout),
        (None, Fallback::Stderr) => BoxMakeWriter::new(io::stderr),
    })
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}
