//! Diagnostics
//!
//! The sequencer reports recoverable problems (stalls) through a sink handed
//! to it by the host, rather than through a process-wide status object. Hosts
//! that already collect runtime warnings plug in their own sink; tests capture
//! messages with `RecordingSink`.

use parking_lot::Mutex;

/// Receives runtime warnings from the sequencer.
pub trait DiagnosticSink: Send + Sync {
    /// Report a recoverable problem.
    fn warning(&self, message: &str);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the warnings received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Drain the warnings received so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl DiagnosticSink for RecordingSink {
    fn warning(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}
