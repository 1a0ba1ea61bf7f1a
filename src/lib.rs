//! Forward structured log events to a Vector TCP socket as newline-delimited
//! JSON over one lazily (re)connected stream.
//!
//! ```no_run
//! use vector_log_forwarder::{Forwarder, ForwarderConfig, LogEvent};
//!
//! let config = ForwarderConfig::new("auth", "localhost:9000").unwrap();
//! let forwarder = Forwarder::new(config);
//!
//! forwarder.send(
//!     &LogEvent::info("User login")
//!         .with_field("user_id", 12345)
//!         .with_field("session_id", "sess_abc123"),
//! );
//! forwarder.close();
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod forwarder;
pub mod init;
pub mod layer;
pub mod level;
pub mod noop_sink;
pub mod record;
pub mod sink;

#[cfg(feature = "async")]
pub mod async_forwarder;

mod backlog;
mod connection;

/// Target of every diagnostic this crate emits about its own connection.
pub const DIAGNOSTIC_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::diagnostics");

pub use config::ForwarderConfig;
pub use error::{ConfigError, ForwardError, InitError};
pub use forwarder::Forwarder;
pub use init::{
    init_forwarding, init_forwarding_on, init_forwarding_with_options, init_test_forwarding,
    LayerOptions,
};
pub use layer::ForwarderLayer;
pub use level::Severity;
pub use record::{Context, LogEvent, WireRecord};
pub use sink::LogSink;

#[cfg(feature = "async")]
pub use async_forwarder::{AsyncForwarder, AsyncLogSink};
