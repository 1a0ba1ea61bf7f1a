//! Non-blocking forwarder for tokio applications.
//!
//! Same contract as [`Forwarder`](crate::forwarder::Forwarder): lazy
//! connection, one line per event, reconnect on the next send after a
//! failure, failures absorbed at `send`. Socket access is serialised by a
//! `tokio::sync::Mutex` so the lock can be held across awaits.

use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};

use crate::backlog::Backlog;
use crate::config::ForwarderConfig;
use crate::error::ForwardError;
use crate::forwarder::{report_failure, report_recovery};
use crate::level::Severity;
use crate::record::LogEvent;

/// Asynchronous destination for [`LogEvent`]s.
#[async_trait]
pub trait AsyncLogSink: Send + Sync {
    /// Send a single event.
    ///
    /// **Returns**
    /// - `true` if the event was delivered (or deliberately filtered).
    /// - `false` if it was dropped.
    async fn send(&self, event: &LogEvent) -> bool;

    /// Release any held resources.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) {}
}

/// Tokio counterpart of [`Forwarder`](crate::forwarder::Forwarder).
#[derive(Debug)]
pub struct AsyncForwarder {
    config: ForwarderConfig,
    state: Mutex<AsyncState>,
}

#[derive(Debug)]
struct AsyncState {
    stream: Option<TcpStream>,
    backlog: Backlog,
    consecutive_failures: u64,
}

impl AsyncForwarder {
    pub fn new(config: ForwarderConfig) -> Self {
        let backlog = Backlog::new(config.backlog_capacity);
        Self {
            config,
            state: Mutex::new(AsyncState {
                stream: None,
                backlog,
                consecutive_failures: 0,
            }),
        }
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.config.level
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.stream.is_some()
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.backlog.len()
    }

    /// Deliver `event`, returning `true` only if its line was fully written.
    pub async fn send(&self, event: &LogEvent) -> bool {
        match self.try_send(event).await {
            Ok(()) => true,
            Err(err @ ForwardError::Serialize(_)) => {
                tracing::warn!(
                    target: crate::DIAGNOSTIC_TARGET,
                    error = %err,
                    "dropping log event that cannot be encoded"
                );
                false
            }
            Err(_) => false,
        }
    }

    pub async fn try_send(&self, event: &LogEvent) -> Result<(), ForwardError> {
        if !self.enabled(event.level) {
            return Ok(());
        }
        let line = event.to_line(&self.config.service_name)?;
        let mut state = self.state.lock().await;
        state.deliver(line, &self.config).await
    }

    /// Shut down and release the connection if one is open. Idempotent.
    pub async fn close(&self) {
        let stream = self.state.lock().await.stream.take();
        if let Some(mut stream) = stream {
            let _ = stream.shutdown().await;
            tracing::debug!(
                target: crate::DIAGNOSTIC_TARGET,
                addr = %self.config.addr(),
                "closed vector connection"
            );
        }
    }
}

impl AsyncState {
    async fn deliver(
        &mut self,
        line: Vec<u8>,
        config: &ForwarderConfig,
    ) -> Result<(), ForwardError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => match connect(config).await {
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
        let deadline = deadline_after(config.write_timeout);
        while let Some(pending) = self.backlog.pop() {
            if let Err(source) = write_line(&mut stream, &pending, deadline).await {
                self.backlog.requeue(pending);
                let err = ForwardError::Write {
                    addr: config.addr(),
                    source,
                };
                return Err(self.fail(err, line));
            }
        }

        if let Err(source) = write_line(&mut stream, &line, deadline).await {
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

    fn fail(&mut self, err: ForwardError, line: Vec<u8>) -> ForwardError {
        self.consecutive_failures += 1;
        let dropped = self.backlog.push(line);
        report_failure(&err, dropped, self.backlog.len(), self.consecutive_failures);
        err
    }
}

fn deadline_after(limit: Option<Duration>) -> Option<Instant> {
    limit
        .filter(|limit| !limit.is_zero())
        .map(|limit| Instant::now() + limit)
}

/// Run `fut` to completion unless `deadline` passes first.
async fn until<F, T>(deadline: Option<Instant>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let Some(deadline) = deadline else {
        return fut.await;
    };
    if deadline <= Instant::now() {
        return Err(timed_out());
    }
    timeout_at(deadline, fut).await.map_err(|_| timed_out())?
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed")
}

/// Resolve and connect, with `connect_timeout` bounding the lookup and every
/// attempt together.
async fn connect(config: &ForwarderConfig) -> Result<TcpStream, ForwardError> {
    connect_by(config, deadline_after(Some(config.connect_timeout))).await
}

async fn connect_by(
    config: &ForwarderConfig,
    deadline: Option<Instant>,
) -> Result<TcpStream, ForwardError> {
    let addr = config.addr();
    let fail = |source: io::Error| ForwardError::Connect {
        addr: addr.clone(),
        source,
    };

    let addrs = until(
        deadline,
        tokio::net::lookup_host((config.host.as_str(), config.port)),
    )
    .await
    .map_err(fail)?;

    let mut last_err = None;
    for socket_addr in addrs {
        match until(deadline, TcpStream::connect(socket_addr)).await {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(fail)?;
                return Ok(stream);
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => return Err(fail(err)),
            Err(err) => last_err = Some(err),
        }
    }

    Err(fail(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}

async fn write_line(
    stream: &mut TcpStream,
    line: &[u8],
    deadline: Option<Instant>,
) -> io::Result<()> {
    until(deadline, async {
        stream.write_all(line).await?;
        stream.flush().await
    })
    .await
}

#[async_trait]
impl AsyncLogSink for AsyncForwarder {
    async fn send(&self, event: &LogEvent) -> bool {
        AsyncForwarder::send(self, event).await
    }

    async fn close(&self) {
        AsyncForwarder::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    async fn local_config(listener: &TcpListener) -> ForwarderConfig {
        let port = listener.local_addr().unwrap().port();
        ForwarderConfig::new("async-unit", &format!("127.0.0.1:{port}"))
            .unwrap()
            .with_connect_timeout(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn sends_one_line_per_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let forwarder = AsyncForwarder::new(local_config(&listener).await);
        assert!(!forwarder.is_connected().await);

        assert!(forwarder.send(&LogEvent::info("first")).await);
        assert!(forwarder.send(&LogEvent::error("second").with_field("code", "E001")).await);

        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let first: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();

        assert_eq!(first["message"], "first");
        assert!(first.get("context").is_none());
        assert_eq!(second["level"], "error");
        assert_eq!(second["context"]["code"], "E001");

        forwarder.close().await;
        forwarder.close().await;
        assert!(!forwarder.is_connected().await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_fast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener).await;
        drop(listener);

        let forwarder = AsyncForwarder::new(config);
        let started = std::time::Instant::now();
        let result = forwarder.try_send(&LogEvent::info("lost")).await;
        assert!(matches!(result, Err(ForwardError::Connect { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(forwarder.pending().await, 0);
    }

    #[tokio::test]
    async fn write_failure_drops_connection_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let forwarder = AsyncForwarder::new(local_config(&listener).await);

        let server = tokio::spawn(async move {
            // First peer reads one line and hangs up.
            let (first, _) = listener.accept().await.unwrap();
            let greeting = BufReader::new(first).lines().next_line().await.unwrap().unwrap();

            let (second, _) = listener.accept().await.unwrap();
            let line = BufReader::new(second).lines().next_line().await.unwrap().unwrap();
            (greeting, line)
        });

        assert!(forwarder.send(&LogEvent::info("first")).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut failed = false;
        for attempt in 0..100 {
            let event = LogEvent::info("after").with_field("attempt", attempt);
            failed |= !forwarder.send(&event).await;
            if server.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(failed, "writing to a closed peer should fail at least once");
        let (greeting, line) = server.await.unwrap();
        let greeting: serde_json::Value = serde_json::from_str(&greeting).unwrap();
        let line: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(greeting["message"], "first");
        assert_eq!(line["message"], "after");
    }

    #[tokio::test]
    async fn backlog_replays_in_order_after_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = local_config(&listener).await.with_backlog_capacity(2);
        drop(listener);

        let forwarder = AsyncForwarder::new(config);
        for message in ["a", "b", "c"] {
            assert!(!forwarder.send(&LogEvent::info(message)).await);
        }
        assert_eq!(forwarder.pending().await, 2);

        let listener = TcpListener::bind(addr).await.unwrap();
        assert!(forwarder.send(&LogEvent::info("d")).await);
        assert_eq!(forwarder.pending().await, 0);

        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let mut messages = Vec::new();
        for _ in 0..3 {
            let line = lines.next_line().await.unwrap().unwrap();
            let record: serde_json::Value = serde_json::from_str(&line).unwrap();
            messages.push(record["message"].as_str().unwrap().to_string());
        }
        assert_eq!(messages, ["b", "c", "d"]);
    }

    #[tokio::test]
    async fn spent_deadline_stops_connect_and_write() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = local_config(&listener).await;

        match connect_by(&config, Some(Instant::now())).await {
            Err(ForwardError::Connect { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::TimedOut)
            }
            other => panic!("expected a connect timeout, got {other:?}"),
        }

        let mut stream = connect(&config).await.unwrap();
        let err = write_line(&mut stream, b"late\n", Some(Instant::now()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
