use std::io;

/// Reasons a single event could not be delivered.
///
/// None of these escape [`Forwarder::send`](crate::forwarder::Forwarder::send);
/// they surface only through `try_send` and the diagnostic log.
#[derive(thiserror::Error, Debug)]
pub enum ForwardError {
    /// Name resolution failed, the peer refused, or the connect timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The connection broke (or stalled past the write timeout) mid-line.
    #[error("failed to write to {addr}: {source}")]
    Write {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A context value could not be turned into JSON; the event is dropped.
    #[error("failed to serialize log event: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ForwardError {
    /// Whether the failure was on the transport rather than in the event.
    pub fn is_transport(&self) -> bool {
        matches!(self, ForwardError::Connect { .. } | ForwardError::Write { .. })
    }
}

/// Error returned while building a [`ForwarderConfig`](crate::config::ForwarderConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("expected `host:port`, got `{0}`")]
    InvalidAddr(String),

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("unknown severity `{0}`")]
    UnknownSeverity(String),

    #[error("invalid duration `{0}`, expected milliseconds")]
    InvalidDuration(String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}
