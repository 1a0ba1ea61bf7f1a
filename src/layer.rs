use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::level::Severity;
use crate::record::{self, LogEvent};
use crate::sink::LogSink;

/// Event field that overrides the level derived from the `tracing` macro,
/// which is the only way to reach [`Severity::Critical`] from `tracing`.
pub const SEVERITY_FIELD: &str = "severity";

/// `tracing_subscriber` layer that turns every event into a [`LogEvent`]
/// and hands it to a [`LogSink`] on the calling thread.
///
/// The event's `message` becomes the record message and every other field
/// becomes a context entry. Span data, target and source location are not
/// forwarded. Events on [`DIAGNOSTIC_TARGET`](crate::DIAGNOSTIC_TARGET) are
/// ignored so that connection diagnostics never loop back into the socket.
pub struct ForwarderLayer {
    sink: Arc<dyn LogSink>,
}

impl ForwarderLayer {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }
}

impl fmt::Debug for ForwarderLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwarderLayer").finish_non_exhaustive()
    }
}

/// Build a [`LogEvent`] from a `tracing` event.
pub fn event_from_tracing(event: &Event<'_>) -> LogEvent {
    let meta = event.metadata();
    let mut visitor = FieldVisitor::default();
    event.record(&mut visitor);

    let level = visitor.severity.unwrap_or_else(|| Severity::from(*meta.level()));
    LogEvent::new(level, visitor.message.unwrap_or_default()).with_context(visitor.context)
}

impl<S> Layer<S> for ForwarderLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == crate::DIAGNOSTIC_TARGET {
            return;
        }

        let event = event_from_tracing(event);
        if self.sink.enabled(event.level) {
            self.sink.send(&event);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    severity: Option<Severity>,
    context: record::Context,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.context.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            SEVERITY_FIELD => match value.parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => self.insert(field, Value::from(value)),
            },
            _ => self.insert(field, Value::from(value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.insert(field, Value::String(rendered));
        }
    }
}
