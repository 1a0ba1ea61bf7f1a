use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Registry;
use vector_log_forwarder::{ForwarderLayer, LogEvent, LogSink};

/// Example of plugging a custom destination into the layer by implementing
/// `LogSink` directly. This one prints each wire record to stdout.
struct StdoutSink {
    service: String,
}

impl LogSink for StdoutSink {
    fn send(&self, event: &LogEvent) -> bool {
        match event.to_line(&self.service) {
            Ok(line) => {
                print!("{}", String::from_utf8_lossy(&line));
                true
            }
            Err(err) => {
                eprintln!("cannot encode event: {err}");
                false
            }
        }
    }
}

fn main() {
    let sink = Arc::new(StdoutSink {
        service: "custom-example".to_string(),
    });
    Registry::default().with(ForwarderLayer::new(sink)).init();

    info!("custom sink example started");
    error!(db = "my-custom-db", "simulated error sent via custom sink");
}
