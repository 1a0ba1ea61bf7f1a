use std::net::{Shutdown, TcpStream};

use parking_lot::Mutex;

use crate::backlog::Backlog;
use crate::config::ForwarderConfig;
use crate::connection;
use crate::error::{ConfigError, ForwardError};
use crate::level::Severity;
use crate::record::LogEvent;
use crate::sink::LogSink;

/// Blocking forwarder that writes each [`LogEvent`] as one JSON line to a
/// Vector TCP socket.
///
/// The connection is opened lazily on the first send, dropped on any write
/// failure and reopened on the next send. All socket access goes through a
/// single mutex, so lines from concurrent callers never interleave and
/// arrive in the order the sends acquired the lock.
///
/// Failures never reach the caller of [`send`](Self::send): it returns
/// `false` and the record is dropped (or parked in the backlog when
/// `backlog_capacity > 0`).
#[derive(Debug)]
pub struct Forwarder {
    config: ForwarderConfig,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    stream: Option<TcpStream>,
    backlog: Backlog,
    consecutive_failures: u64,
}

impl Forwarder {
    /// Create a forwarder. No connection is attempted until the first send.
    pub fn new(config: ForwarderConfig) -> Self {
        let backlog = Backlog::new(config.backlog_capacity);
        Self {
            config,
            state: Mutex::new(State {
                stream: None,
                backlog,
                consecutive_failures: 0,
            }),
        }
    }

    /// Shorthand for [`ForwarderConfig::new`] with every other option left
    /// at its default.
    pub fn connect_lazy(service_name: &str, addr: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(ForwarderConfig::new(service_name, addr)?))
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    /// Whether events at `level` pass the configured threshold.
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.config.level
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().stream.is_some()
    }

    /// Number of undelivered lines waiting for the endpoint to come back.
    pub fn pending(&self) -> usize {
        self.state.lock().backlog.len()
    }

    /// Deliver `event`, returning `true` only if its line was fully written.
    ///
    /// Events below the threshold count as delivered. Every failure is
    /// logged at most at `warn` and swallowed.
    pub fn send(&self, event: &LogEvent) -> bool {
        match self.try_send(event) {
            Ok(()) => true,
            Err(err @ ForwardError::Serialize(_)) => {
                tracing::warn!(
                    target: crate::DIAGNOSTIC_TARGET,
                    error = %err,
                    "dropping log event that cannot be encoded"
                );
                false
            }
            // Transport failures are reported by the state machine itself.
            Err(_) => false,
        }
    }

    /// Same as [`send`](Self::send) but returns the failure cause.
    pub fn try_send(&self, event: &LogEvent) -> Result<(), ForwardError> {
        if !self.enabled(event.level) {
            return Ok(());
        }
        let line = event.to_line(&self.config.service_name)?;
        self.state.lock().deliver(line, &self.config)
    }

    /// Release the connection if one is open. Safe to call repeatedly; the
    /// next send reconnects.
    pub fn close(&self) {
        if let Some(stream) = self.state.lock().stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!(
                target: crate::DIAGNOSTIC_TARGET,
                addr = %self.config.addr(),
                "closed vector connection"
            );
        }
    }
}

impl State {
    fn deliver(&mut self, line: Vec<u8>, config: &ForwarderConfig) -> Result<(), ForwardError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => match connection::connect(config) {
                Ok(stream) => {
                    tracing::debug!(
                        target: crate::DIAGNOSTIC_TARGET,
                        addr = %config.addr(),
                        "connected to vector"
                    );
                    stream
                }
                Err(err) => return Err(self.fail(err, line)),
            },
        };

        // One write deadline covers the replayed backlog and the new line.
        let deadline = connection::deadline_after(config.write_timeout);
        while let Some(pending) = self.backlog.pop() {
            if let Err(source) = connection::write_line(&mut stream, &pending, deadline) {
                self.backlog.requeue(pending);
                let err = ForwardError::Write {
                    addr: config.addr(),
                    source,
                };
                return Err(self.fail(err, line));
            }
        }

        if let Err(source) = connection::write_line(&mut stream, &line, deadline) {
            let err = ForwardError::Write {
                addr: config.addr(),
                source,
            };
            return Err(self.fail(err, line));
        }

        report_recovery(config, std::mem::take(&mut self.consecutive_failures));
        self.stream = Some(stream);
        Ok(())
    }

    /// Record a transport failure and park `line` in the backlog. The stream
    /// has already been taken out of `self`, so returning drops (closes) it.
    fn fail(&mut self, err: ForwardError, line: Vec<u8>) -> ForwardError {
        self.consecutive_failures += 1;
        let dropped = self.backlog.push(line);
        report_failure(&err, dropped, self.backlog.len(), self.consecutive_failures);
        err
    }
}

/// Warn on the first failure of a streak, then drop to `debug` so a dead
/// endpoint does not flood the local log.
pub(crate) fn report_failure(err: &ForwardError, dropped: usize, pending: usize, failures: u64) {
    if failures == 1 {
        tracing::warn!(
            target: crate::DIAGNOSTIC_TARGET,
            error = %err,
            dropped,
            pending,
            "failed to send log to vector"
        );
    } else {
        tracing::debug!(
            target: crate::DIAGNOSTIC_TARGET,
            error = %err,
            dropped,
            pending,
            failed_sends = failures,
            "vector still unreachable"
        );
    }
}

pub(crate) fn report_recovery(config: &ForwarderConfig, failures: u64) {
    if failures > 0 {
        tracing::info!(
            target: crate::DIAGNOSTIC_TARGET,
            addr = %config.addr(),
            failed_sends = failures,
            "vector connection recovered"
        );
    }
}

impl LogSink for Forwarder {
    fn send(&self, event: &LogEvent) -> bool {
        Forwarder::send(self, event)
    }

    fn enabled(&self, level: Severity) -> bool {
        Forwarder::enabled(self, level)
    }

    fn close(&self) {
        Forwarder::close(self)
    }
}
