use crate::level::Severity;
use crate::record::LogEvent;

/// Destination for [`LogEvent`]s produced by [`ForwarderLayer`](crate::layer::ForwarderLayer)
/// or by application code directly.
///
/// Implementations are called on the application thread and must absorb
/// their own failures: `send` reports success as a boolean and never
/// panics.
pub trait LogSink: Send + Sync {
    /// Send a single event to the underlying destination.
    ///
    /// **Returns**
    /// - `true` if the event was delivered (or deliberately filtered).
    /// - `false` if it was dropped because of a transport or encoding
    ///   failure.
    fn send(&self, event: &LogEvent) -> bool;

    /// Whether events at `level` would be forwarded at all. Callers can use
    /// this to skip building events that would be filtered anyway.
    ///
    /// Default implementation accepts everything.
    fn enabled(&self, level: Severity) -> bool {
        let _ = level;
        true
    }

    /// Release any held resources. Must be idempotent.
    ///
    /// Default implementation is a no-op.
    fn close(&self) {}
}
