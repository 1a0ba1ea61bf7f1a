use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::level::Severity;

/// Caller-supplied key/value data attached to a [`LogEvent`].
pub type Context = Map<String, Value>;

/// A structured log event as handed to a forwarder.
///
/// The service name is not part of the event: it is fixed per forwarder and
/// stamped on when the event is turned into a [`WireRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub message: String,
    pub context: Context,
    /// First context value that failed to serialize, if any.
    rejected: Option<String>,
}

impl LogEvent {
    /// Create an event stamped with the current time and no context.
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context: Context::new(),
            rejected: None,
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    /// Override the capture instant.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a context entry. Re-using a key replaces the earlier value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach any serializable value as a context entry.
    ///
    /// If the value cannot be represented as JSON the whole event is marked
    /// rejected and will be dropped by the forwarder instead of being sent
    /// with a partial context.
    pub fn with_serialized<T>(mut self, key: impl Into<String>, value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.context.insert(key, value);
            }
            Err(err) => {
                if self.rejected.is_none() {
                    self.rejected = Some(format!("context field `{key}`: {err}"));
                }
            }
        }
        self
    }

    /// Merge a whole context map into the event.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context.extend(context);
        self
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }

    /// Borrow the event as the record that goes on the wire.
    pub fn to_wire<'a>(&'a self, service: &'a str) -> WireRecord<'a> {
        WireRecord {
            timestamp: format_timestamp(&self.timestamp),
            level: self.level,
            message: &self.message,
            service,
            context: &self.context,
        }
    }

    /// Encode the event as one newline-terminated JSON line.
    pub fn to_line(&self, service: &str) -> Result<Vec<u8>, serde_json::Error> {
        if let Some(reason) = &self.rejected {
            return Err(<serde_json::Error as serde::ser::Error>::custom(reason));
        }
        let mut line = serde_json::to_vec(&self.to_wire(service))?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Canonical JSON representation of one event.
#[derive(Debug, Serialize)]
pub struct WireRecord<'a> {
    pub timestamp: String,
    pub level: Severity,
    pub message: &'a str,
    pub service: &'a str,
    #[serde(skip_serializing_if = "context_is_empty")]
    pub context: &'a Context,
}

fn context_is_empty(context: &&Context) -> bool {
    context.is_empty()
}

/// ISO-8601 UTC with microsecond precision and a `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 9, 28, 15, 4, 5).unwrap()
            + chrono::Duration::microseconds(123_456)
    }

    fn parse(line: &[u8]) -> Value {
        assert_eq!(line.last(), Some(&b'\n'));
        serde_json::from_slice(&line[..line.len() - 1]).unwrap()
    }

    #[test]
    fn timestamp_has_microseconds_and_z_suffix() {
        assert_eq!(format_timestamp(&fixed_instant()), "2023-09-28T15:04:05.123456Z");
        let whole = Utc.with_ymd_and_hms(2023, 9, 28, 15, 4, 5).unwrap();
        assert_eq!(format_timestamp(&whole), "2023-09-28T15:04:05.000000Z");
    }

    #[test]
    fn timestamp_is_deterministic_for_fixed_instant() {
        let event = LogEvent::info("tick").at(fixed_instant());
        assert_eq!(event.to_line("svc").unwrap(), event.clone().to_line("svc").unwrap());
    }

    #[test]
    fn user_login_record_matches_wire_schema() {
        let event = LogEvent::info("User login")
            .at(fixed_instant())
            .with_field("user_id", 12345)
            .with_field("session_id", "sess_abc123");

        let record = parse(&event.to_line("auth").unwrap());
        assert_eq!(
            record,
            json!({
                "timestamp": "2023-09-28T15:04:05.123456Z",
                "level": "info",
                "message": "User login",
                "service": "auth",
                "context": {"user_id": 12345, "session_id": "sess_abc123"}
            })
        );
    }

    #[test]
    fn empty_context_is_omitted() {
        let record = parse(&LogEvent::info("ping").to_line("auth").unwrap());
        let object = record.as_object().unwrap();
        assert!(!object.contains_key("context"));
        let mut keys: Vec<_> = object.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["level", "message", "service", "timestamp"]);
    }

    #[test]
    fn context_holds_only_caller_fields() {
        let mut extra = Context::new();
        extra.insert("nested".into(), json!({"a": [1, 2]}));
        let event = LogEvent::warning("disk")
            .with_field("free_mb", 12.5)
            .with_context(extra);

        let record = parse(&event.to_line("store").unwrap());
        let context = record["context"].as_object().unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context["nested"], json!({"a": [1, 2]}));
        assert_eq!(record["level"], "warning");
    }

    #[test]
    fn unserializable_context_rejects_whole_event() {
        use std::collections::HashMap;

        // Non-string map keys cannot become JSON object keys.
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "x");

        let event = LogEvent::error("boom")
            .with_field("ok", true)
            .with_serialized("bad", &bad);

        assert!(event.is_rejected());
        let err = event.to_line("svc").unwrap_err();
        assert!(err.to_string().contains("bad"), "{err}");
    }

    #[test]
    fn serializable_structs_become_nested_context() {
        #[derive(Serialize)]
        struct Request<'a> {
            method: &'a str,
            status: u16,
        }

        let event = LogEvent::info("request").with_serialized(
            "request",
            &Request { method: "POST", status: 201 },
        );
        let record = parse(&event.to_line("api").unwrap());
        assert_eq!(record["context"]["request"], json!({"method": "POST", "status": 201}));
    }
}
