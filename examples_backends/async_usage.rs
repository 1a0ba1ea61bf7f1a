use std::time::Duration;

use vector_log_forwarder::{AsyncForwarder, ForwarderConfig, LogEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForwarderConfig::new("async-example", "localhost:9000")?
        .with_connect_timeout(Duration::from_secs(1))
        .with_backlog_capacity(32);
    let forwarder = AsyncForwarder::new(config);

    for i in 0..5 {
        let event = LogEvent::info("tick").with_field("sequence", i);
        if !forwarder.send(&event).await {
            println!("tick {i} not delivered, {} pending", forwarder.pending().await);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    forwarder.close().await;
    Ok(())
}
