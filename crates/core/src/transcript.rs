//! Human-readable narration of a scenario run.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::Local;

/// Receives transcript lines as a scenario progresses.
///
/// Methods take `&self` so two lock requests awaited together can both
/// narrate.
pub trait Narrator: Sync {
    fn say(&self, line: &str);
}

/// Prints every line to standard output as soon as it is said.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNarrator;

impl Narrator for StdoutNarrator {
    fn say(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort a running transaction.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct RecordingNarrator {
    lines: Mutex<Vec<String>>,
}

impl RecordingNarrator {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Narrator for RecordingNarrator {
    fn say(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}

/// `"<event>: <local time with microseconds>"`.
#[must_use]
pub fn stamped(event: &str) -> String {
    format!("{event}: {}", Local::now().format(TIMESTAMP_FORMAT))
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
