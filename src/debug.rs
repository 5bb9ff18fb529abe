//! Debug output sink.
//!
//! Human-readable progress lines (connect attempts, executed text, status)
//! go through a `DebugSink` so they can be printed, silenced, or captured.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives human-readable progress lines.
pub trait DebugSink: Send + Sync {
    /// Emits one line.
    fn emit(&self, line: &str);
}

/// Prints every line to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl DebugSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

/// Discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl DebugSink for Silent {
    fn emit(&self, _line: &str) {}
}

/// Keeps every line in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every line emitted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if any emitted line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl DebugSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

/// Returns the sink matching the `print_debug` setting.
pub fn sink_for(print_debug: bool) -> Arc<dyn DebugSink> {
    if print_debug {
        Arc::new(StdoutSink)
    } else {
        Arc::new(Silent)
    }
}
