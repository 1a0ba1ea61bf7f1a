use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vector_log_forwarder::{Forwarder, ForwarderConfig, LogEvent};

/// Hammer one forwarder from several threads with a small backlog and a
/// short write deadline, then report how many sends were delivered.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForwarderConfig::new("backlog-load", "localhost:9000")?
        .with_connect_timeout(Duration::from_millis(200))
        .with_write_timeout(Some(Duration::from_millis(500)))
        .with_backlog_capacity(256);
    let forwarder = Arc::new(Forwarder::new(config));

    let threads = 4;
    let per_thread: u64 = 25_000;
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let forwarder = Arc::clone(&forwarder);
            thread::spawn(move || {
                (0..per_thread)
                    .filter(|i| {
                        let event = LogEvent::error("backlog load test error")
                            .with_field("worker", worker)
                            .with_field("iteration", *i);
                        forwarder.send(&event)
                    })
                    .count()
            })
        })
        .collect();

    let delivered: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or(0))
        .sum();

    println!(
        "backlog config: {} of {} events delivered in {:?}, {} still pending",
        delivered,
        threads * per_thread,
        start.elapsed(),
        forwarder.pending()
    );

    forwarder.close();
    Ok(())
}
