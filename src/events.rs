//! Caller-supplied sinks for progress and warning events.
//!
//! The library never owns a global sink. Long-running operations (currently
//! only the bin-centric builder) take an `&dyn EventSink`; everything else
//! reports through the `log` facade. [`NullSink`] discards events and
//! [`ConsoleSink`] prints them, for callers that do not wire their own.

/// Receiver for progress and warning events emitted by long-running
/// library operations.
///
/// Events are emitted in monotonic call order from the calling thread.
pub trait EventSink {
    /// Free-form informational message.
    fn message(&self, text: &str);

    /// Progress report: `percent` is in `[0.0, 100.0]` and never decreases
    /// within one operation; `task` names the current phase.
    fn progress(&self, percent: f64, task: &str);

    /// Recoverable error notification with a short kind tag and context.
    fn error(&self, kind: &str, context: &str);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn message(&self, _text: &str) {}
    fn progress(&self, _percent: f64, _task: &str) {}
    fn error(&self, _kind: &str, _context: &str) {}
}

/// Fallback sink that writes events to standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn message(&self, text: &str) {
        eprintln!("{text}");
    }

    fn progress(&self, percent: f64, task: &str) {
        eprintln!("[{percent:5.1}%] {task}");
    }

    fn error(&self, kind: &str, context: &str) {
        eprintln!("error ({kind}): {context}");
    }
}
