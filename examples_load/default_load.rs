use std::time::Instant;

use tracing::error;
use vector_log_forwarder::{init_forwarding, ForwarderConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForwarderConfig::new("load-test", "localhost:9000")?;
    let forwarder = init_forwarding(config)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!(
        "default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    forwarder.close();
    Ok(())
}
