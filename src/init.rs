use std::sync::{Arc, OnceLock};

use tracing::Subscriber;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use crate::config::ForwarderConfig;
use crate::error::InitError;
use crate::forwarder::Forwarder;
use crate::layer::ForwarderLayer;
use crate::level::Severity;

/// Options for the subscriber installed by [`init_forwarding_with_options`].
///
/// **Fields**
/// - `enable_stdout`: if `true` (the default), a `tracing_subscriber::fmt`
///   layer prints every event on stdout next to the [`ForwarderLayer`]. If
///   `false`, only this crate's own diagnostics (connect and write failures)
///   are printed, on stderr.
/// - `stdout_level`: minimum level of that local output.
#[derive(Clone, Debug)]
pub struct LayerOptions {
    pub enable_stdout: bool,
    pub stdout_level: LevelFilter,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            stdout_level: LevelFilter::INFO,
        }
    }
}

/// Tightest `tracing` filter that still lets through every event the
/// forwarder would accept. `critical` is reachable only through `ERROR`
/// events carrying a `severity` field.
pub fn level_filter(level: Severity) -> LevelFilter {
    match level {
        Severity::Debug => LevelFilter::TRACE,
        Severity::Info => LevelFilter::INFO,
        Severity::Warning => LevelFilter::WARN,
        Severity::Error | Severity::Critical => LevelFilter::ERROR,
    }
}

/// The `fmt` layer installed next to the forwarder. The forwarder layer
/// skips [`DIAGNOSTIC_TARGET`](crate::DIAGNOSTIC_TARGET), so this is where
/// delivery failures become visible.
fn local_layer<S, W>(options: &LayerOptions, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    if options.enable_stdout {
        layer.with_filter(options.stdout_level).boxed()
    } else {
        let diagnostics =
            Targets::new().with_target(crate::DIAGNOSTIC_TARGET, options.stdout_level);
        layer.with_filter(diagnostics).boxed()
    }
}

fn install<S>(subscriber: S, forwarder: &Arc<Forwarder>) -> Result<(), InitError>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static,
{
    let filter = level_filter(forwarder.config().level);
    let layer = ForwarderLayer::new(forwarder.clone()).with_filter(filter);
    subscriber.with(layer).try_init()?;
    Ok(())
}

/// Add a [`ForwarderLayer`] to a subscriber the caller has already built
/// and install the result as the global default.
///
/// Use this when the application composes its own layers (filters, JSON
/// output, OpenTelemetry, ...). Nothing else is added, so local output of
/// the forwarder's diagnostics is up to `subscriber`.
///
/// ```no_run
/// use tracing_subscriber::layer::SubscriberExt;
/// use vector_log_forwarder::{init_forwarding_on, ForwarderConfig};
///
/// let registry = tracing_subscriber::registry().with(tracing_subscriber::fmt::layer());
/// let config = ForwarderConfig::new("my-service", "localhost:9000").unwrap();
/// let forwarder = init_forwarding_on(registry, config).unwrap();
/// ```
pub fn init_forwarding_on<S>(
    subscriber: S,
    config: ForwarderConfig,
) -> Result<Arc<Forwarder>, InitError>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static,
{
    let forwarder = Arc::new(Forwarder::new(config));
    install(subscriber, &forwarder)?;
    Ok(forwarder)
}

/// Install a global subscriber that forwards `tracing` events to Vector.
///
/// **Parameters**
/// - `config`: [`ForwarderConfig`] for the forwarder that owns the socket.
/// - `options`: [`LayerOptions`] controlling local output.
///
/// **Returns**
/// - The forwarder, so the application controls its lifetime and can
///   call [`Forwarder::close`] on shutdown.
/// - [`InitError`] if a global subscriber is already installed.
pub fn init_forwarding_with_options(
    config: ForwarderConfig,
    options: LayerOptions,
) -> Result<Arc<Forwarder>, InitError> {
    let local = if options.enable_stdout {
        local_layer::<Registry, _>(&options, std::io::stdout)
    } else {
        local_layer::<Registry, _>(&options, std::io::stderr)
    };
    init_forwarding_on(Registry::default().with(local), config)
}

/// Install a global subscriber with [`LayerOptions::default`].
///
/// This is the recommended entrypoint for typical services:
///
/// ```no_run
/// use vector_log_forwarder::{init_forwarding, ForwarderConfig};
///
/// let config = ForwarderConfig::new("my-service", "localhost:9000").unwrap();
/// let forwarder = init_forwarding(config).unwrap();
/// tracing::info!(version = "1.0.0", "application started");
/// forwarder.close();
/// ```
pub fn init_forwarding(config: ForwarderConfig) -> Result<Arc<Forwarder>, InitError> {
    init_forwarding_with_options(config, LayerOptions::default())
}

/// Build the forwarder from the `VECTOR_FORWARDER_*` environment and install
/// it with [`LayerOptions::default`].
pub fn init_forwarding_from_env(
) -> Result<Arc<Forwarder>, Box<dyn std::error::Error + Send + Sync>> {
    let config = ForwarderConfig::from_env()?;
    Ok(init_forwarding(config)?)
}

static TEST_FORWARDER: OnceLock<Arc<Forwarder>> = OnceLock::new();

/// Install forwarding for a test binary, at most once per process.
///
/// Safe to call from every test: the first call builds the forwarder and
/// installs it with local output routed through libtest's captured writer,
/// later calls return that same forwarder and ignore their `config`. If
/// another global subscriber is already installed it is left in place.
pub fn init_test_forwarding(config: ForwarderConfig) -> Arc<Forwarder> {
    TEST_FORWARDER
        .get_or_init(|| {
            let forwarder = Arc::new(Forwarder::new(config));
            let local = tracing_subscriber::fmt::layer()
                .with_test_writer()
                .with_filter(LevelFilter::DEBUG);
            let _ = install(Registry::default().with(local), &forwarder);
            forwarder
        })
        .clone()
}
