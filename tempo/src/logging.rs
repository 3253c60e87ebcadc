use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialises default `tempo` logging: `RUST_LOG`-controlled level filtering (defaulting to
/// `INFO`) plus a human-readable `fmt` layer.
///
/// Grounded in `barter::logging::init_logging` — the engine itself only ever emits `tracing`
/// events (see `warn!` calls in [`crate::engine`]), it never installs a subscriber; that is an
/// application-level decision this function exists to make easy for host binaries and tests.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
