//! Status sink
//!
//! Free-text progress for the user ("Optimizing for target size: 5.00 MB...").
//! Messages are observational only; nothing in the optimizer reads them back.
//! Every message is mirrored to `tracing` so headless runs keep a trail.

use tracing::info;

pub trait StatusSink {
    fn status(&self, message: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str),
{
    fn status(&self, message: &str) {
        self(message)
    }
}

/// Discards messages (they still reach the log).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStatus;

impl StatusSink for NoStatus {
    fn status(&self, _message: &str) {}
}

/// Collects messages in memory; handy for tests and for callers that show
/// the log after the fact.
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: std::sync::Mutex<Vec<String>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl StatusSink for StatusLog {
    fn status(&self, message: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}

/// Sends a message to the sink and to the log.
pub(crate) fn emit(sink: &dyn StatusSink, message: &str) {
    info!(target: "size_utils::status", "{}", message);
    sink.status(message);
}
