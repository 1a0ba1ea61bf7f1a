use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use vector_log_forwarder::{init_forwarding_with_options, ForwarderConfig, LayerOptions, Severity};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ForwarderConfig::new("basic-example", "localhost:9000")?.with_level(Severity::Debug);
    // Print everything locally too, not just info and above.
    let options = LayerOptions {
        stdout_level: LevelFilter::DEBUG,
        ..LayerOptions::default()
    };
    let forwarder = init_forwarding_with_options(config, options)?;

    info!(version = "1.0.0", "Application started");
    debug!(component = "main", "Debug information");
    warn!(code = "W001", "This is a warning");
    error!(code = "E001", "This is an error");
    error!(severity = "critical", code = "E999", "Out of disk space");

    info!(
        user_id = 12345,
        operation = "login",
        ip_address = "192.168.1.100",
        session_id = "sess_abc123",
        "User operation"
    );

    forwarder.close();
    Ok(())
}
