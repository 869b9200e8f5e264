//! User-facing output sink.
//!
//! Components that talk to the operator (welcome messages, completion
//! reports, next steps) write through this trait instead of a process-global
//! console, so callers decide where the text lands and tests can capture it.

#[cfg(test)]
use std::sync::Mutex;

/// Destination for user-facing report lines. Diagnostic logging stays on
/// `tracing`; this is only for output the operator is meant to read.
pub trait OutputSink: Send + Sync {
    fn line(&self, message: &str);

    /// Convenience for a blank separator line.
    fn blank(&self) {
        self.line("");
    }
}

/// Production sink writing to stdout.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn line(&self, message: &str) {
        println!("{message}");
    }
}

/// Capturing sink for tests.
#[cfg(test)]
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink poisoned").clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl OutputSink for BufferSink {
    fn line(&self, message: &str) {
        self.lines
            .lock()
            .expect("sink poisoned")
            .push(message.to_string());
    }
}
