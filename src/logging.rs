/// Logging setup
///
/// Console output through `tracing-subscriber`. `RUST_LOG` overrides the
/// default level, e.g. `RUST_LOG=rgb_generator=debug` shows per-batch lines.
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}
