use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::LogEvent;
use crate::sink::LogSink;

/// A sink that simply drops all events.
///
/// Useful for measuring the overhead of the layer itself without any
/// network I/O, and for tests that don't care about delivery.
#[derive(Debug, Default)]
pub struct NoopSink {
    seen: AtomicU64,
}

impl NoopSink {
    /// Events handed to this sink so far.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl LogSink for NoopSink {
    fn send(&self, _event: &LogEvent) -> bool {
        self.seen.fetch_add(1, Ordering::Relaxed);
        true
    }
}
