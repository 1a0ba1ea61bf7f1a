use std::time::Duration;

use crate::env;
use crate::error::ConfigError;
use crate::level::Severity;

/// Default Vector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default Vector TCP source port.
pub const DEFAULT_PORT: u16 = 9000;
/// Default service name when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "rust-service";
/// Default bound on resolving and connecting, across all resolved addresses.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for the writes of one send.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of a [`Forwarder`](crate::forwarder::Forwarder).
///
/// **Fields**
/// - `host` / `port`: Vector TCP endpoint.
/// - `service_name`: value of the `service` field on every record.
/// - `connect_timeout`: upper bound on one connect, shared by every resolved
///   address. Blocking DNS resolution cannot be interrupted, only charged
///   against it.
/// - `write_timeout`: upper bound on the writes of one send (replayed
///   backlog plus the new line); `None` waits as long as the peer takes.
/// - `level`: events below this severity are not forwarded.
/// - `backlog_capacity`: number of undelivered lines kept and replayed once
///   the endpoint is reachable again. `0` drops them immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwarderConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub connect_timeout: Duration,
    pub write_timeout: Option<Duration>,
    pub level: Severity,
    pub backlog_capacity: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            level: Severity::Info,
            backlog_capacity: 0,
        }
    }
}

impl ForwarderConfig {
    /// Config for `service_name` shipping to `addr` (`host:port`).
    pub fn new(service_name: impl Into<String>, addr: &str) -> Result<Self, ConfigError> {
        Self::default().with_service_name(service_name).with_addr(addr)
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Replace host and port from a `host:port` string. IPv6 hosts must be
    /// bracketed (`[::1]:9000`).
    pub fn with_addr(mut self, addr: &str) -> Result<Self, ConfigError> {
        let (host, port) = parse_addr(addr)?;
        self.host = host;
        self.port = port;
        Ok(self)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn with_backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity;
        self
    }

    /// Endpoint in `host:port` form, as used in diagnostics.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Build a config from the `VECTOR_FORWARDER_*` environment variables,
    /// falling back to [`Default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::env_opt)
    }

    /// Same as [`from_env`](Self::from_env) but reading values through
    /// `lookup`, which lets callers layer their own configuration source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(env::VECTOR_FORWARDER_ADDR_ENV) {
            config = config.with_addr(&addr)?;
        }
        if let Some(service) = lookup(env::VECTOR_FORWARDER_SERVICE_ENV) {
            config.service_name = service;
        }
        if let Some(level) = lookup(env::VECTOR_FORWARDER_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(ms) = lookup(env::VECTOR_FORWARDER_CONNECT_TIMEOUT_MS_ENV) {
            config.connect_timeout = parse_millis(&ms)?;
        }
        if let Some(ms) = lookup(env::VECTOR_FORWARDER_WRITE_TIMEOUT_MS_ENV) {
            let timeout = parse_millis(&ms)?;
            config.write_timeout = (!timeout.is_zero()).then_some(timeout);
        }
        if let Some(capacity) = lookup(env::VECTOR_FORWARDER_BACKLOG_ENV) {
            config.backlog_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber(capacity.clone()))?;
        }

        Ok(config)
    }
}

fn parse_addr(addr: &str) -> Result<(String, u16), ConfigError> {
    let addr = addr.trim();
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidAddr(addr.to_string()))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| ConfigError::InvalidAddr(addr.to_string()))?,
        None if host.contains(':') => return Err(ConfigError::InvalidAddr(addr.to_string())),
        None => host,
    };
    if host.is_empty() {
        return Err(ConfigError::InvalidAddr(addr.to_string()));
    }

    let port = match port.parse::<u16>() {
        Ok(0) | Err(_) => return Err(ConfigError::InvalidPort(port.to_string())),
        Ok(port) => port,
    };

    Ok((host.to_string(), port))
}

fn parse_millis(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDuration(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case("localhost:9000", "localhost", 9000)]
    #[case("10.0.0.7:6000", "10.0.0.7", 6000)]
    #[case("[::1]:9000", "::1", 9000)]
    #[case(" vector.internal:1 ", "vector.internal", 1)]
    fn parses_valid_addrs(#[case] addr: &str, #[case] host: &str, #[case] port: u16) {
        let config = ForwarderConfig::default().with_addr(addr).unwrap();
        assert_eq!(config.host, host);
        assert_eq!(config.port, port);
    }

    #[rstest]
    #[case("localhost")]
    #[case(":9000")]
    #[case("::1:9000")]
    #[case("[::1:9000")]
    fn rejects_malformed_addrs(#[case] addr: &str) {
        let err = ForwarderConfig::default().with_addr(addr).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddr(_)), "{err}");
    }

    #[rstest]
    #[case("localhost:0")]
    #[case("localhost:70000")]
    #[case("localhost:http")]
    fn rejects_bad_ports(#[case] addr: &str) {
        let err = ForwarderConfig::default().with_addr(addr).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)), "{err}");
    }

    #[test]
    fn addr_round_trips_ipv6_brackets() {
        let config = ForwarderConfig::new("svc", "[::1]:9000").unwrap();
        assert_eq!(config.addr(), "[::1]:9000");
        let config = ForwarderConfig::new("svc", "localhost:9000").unwrap();
        assert_eq!(config.addr(), "localhost:9000");
    }

    #[test]
    fn defaults_do_not_buffer() {
        let config = ForwarderConfig::default();
        assert_eq!(config.backlog_capacity, 0);
        assert_eq!(config.level, Severity::Info);
        assert_eq!(config.addr(), "localhost:9000");
    }

    #[test]
    fn reads_every_variable_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (env::VECTOR_FORWARDER_ADDR_ENV, "vector:6000"),
            (env::VECTOR_FORWARDER_SERVICE_ENV, "billing"),
            (env::VECTOR_FORWARDER_LEVEL_ENV, "warn"),
            (env::VECTOR_FORWARDER_CONNECT_TIMEOUT_MS_ENV, "250"),
            (env::VECTOR_FORWARDER_WRITE_TIMEOUT_MS_ENV, "0"),
            (env::VECTOR_FORWARDER_BACKLOG_ENV, "64"),
        ]);
        let config =
            ForwarderConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.addr(), "vector:6000");
        assert_eq!(config.service_name, "billing");
        assert_eq!(config.level, Severity::Warning);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.write_timeout, None);
        assert_eq!(config.backlog_capacity, 64);
    }

    #[test]
    fn lookup_errors_are_reported() {
        let err = ForwarderConfig::from_lookup(|key| {
            (key == env::VECTOR_FORWARDER_LEVEL_ENV).then(|| "chatty".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSeverity(_)));

        let err = ForwarderConfig::from_lookup(|key| {
            (key == env::VECTOR_FORWARDER_CONNECT_TIMEOUT_MS_ENV).then(|| "5s".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration(_)));
    }
}
