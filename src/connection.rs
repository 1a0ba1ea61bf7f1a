//! Transport primitives for the forwarder.
//!
//! Timeouts are overall deadlines: `connect_timeout` bounds every attempt of
//! one connect together, `write_timeout` bounds every write of one send.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::config::ForwarderConfig;
use crate::error::ForwardError;

/// Instant by which an operation limited to `limit` must finish. Zero and
/// `None` both mean no deadline.
pub(crate) fn deadline_after(limit: Option<Duration>) -> Option<Instant> {
    limit
        .filter(|limit| !limit.is_zero())
        .map(|limit| Instant::now() + limit)
}

/// Time left before `deadline`, or `TimedOut` once it has passed.
fn remaining(deadline: Option<Instant>) -> io::Result<Option<Duration>> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };
    match deadline.checked_duration_since(Instant::now()) {
        Some(left) if !left.is_zero() => Ok(Some(left)),
        _ => Err(timed_out()),
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed")
}

fn socket_addrs(config: &ForwarderConfig) -> io::Result<Vec<SocketAddr>> {
    (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map(|iter| iter.collect())
}

fn connect_addr(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    match timeout {
        Some(timeout) => TcpStream::connect_timeout(addr, timeout),
        None => TcpStream::connect(addr),
    }
}

/// Open a stream to the configured endpoint, trying every resolved address
/// until `connect_timeout` is spent.
pub(crate) fn connect(config: &ForwarderConfig) -> Result<TcpStream, ForwardError> {
    connect_by(config, deadline_after(Some(config.connect_timeout)))
}

/// Blocking resolution cannot be interrupted, so the time it takes is
/// charged against the attempts that follow it.
fn connect_by(
    config: &ForwarderConfig,
    deadline: Option<Instant>,
) -> Result<TcpStream, ForwardError> {
    let addr = config.addr();
    let fail = |source: io::Error| ForwardError::Connect {
        addr: addr.clone(),
        source,
    };

    let mut last_err = None;
    for socket_addr in socket_addrs(config).map_err(fail)? {
        let timeout = remaining(deadline).map_err(fail)?;
        match connect_addr(&socket_addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(fail)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(fail(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}

/// Write a full line to the socket before `deadline`.
///
/// `SO_SNDTIMEO` only bounds a single `write(2)`, so the socket timeout is
/// re-armed with whatever is left of the deadline before every partial write.
pub(crate) fn write_line(
    stream: &mut TcpStream,
    line: &[u8],
    deadline: Option<Instant>,
) -> io::Result<()> {
    let mut written = 0;
    while written < line.len() {
        stream.set_write_timeout(remaining(deadline)?)?;
        match stream.write(&line[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "peer stopped accepting data",
                ))
            }
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Err(timed_out()),
            Err(err) => return Err(err),
        }
    }
    stream.flush()
}
