//! Logging initialisation for binaries and tests embedding the toolkit.

/// Install a `tracing` subscriber writing to stderr.
///
/// Filtering follows `RUST_LOG` when set, defaulting to `info`. Safe to
/// call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
