/// Environment variable names used by this crate for convenient
/// configuration of forwarders from services.
///
/// These are purely helpers; [`ForwarderConfig`](crate::config::ForwarderConfig)
/// itself never reads the environment unless asked to via `from_env`.

/// Vector TCP endpoint as `host:port`, e.g. `127.0.0.1:9000`.
pub const VECTOR_FORWARDER_ADDR_ENV: &str = "VECTOR_FORWARDER_ADDR";

/// Service name stamped on every record.
pub const VECTOR_FORWARDER_SERVICE_ENV: &str = "VECTOR_FORWARDER_SERVICE";

/// Minimum severity forwarded (`debug`, `info`, `warning`, `error`, `critical`).
pub const VECTOR_FORWARDER_LEVEL_ENV: &str = "VECTOR_FORWARDER_LEVEL";

/// Connect timeout in milliseconds.
pub const VECTOR_FORWARDER_CONNECT_TIMEOUT_MS_ENV: &str = "VECTOR_FORWARDER_CONNECT_TIMEOUT_MS";

/// Write timeout in milliseconds; `0` disables the deadline.
pub const VECTOR_FORWARDER_WRITE_TIMEOUT_MS_ENV: &str = "VECTOR_FORWARDER_WRITE_TIMEOUT_MS";

/// Number of undelivered lines kept for replay; `0` disables the backlog.
pub const VECTOR_FORWARDER_BACKLOG_ENV: &str = "VECTOR_FORWARDER_BACKLOG";

/// Read an environment variable, treating unset and empty the same.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
