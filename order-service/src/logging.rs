use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber once, honoring `RUST_LOG`
/// with a sensible default when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();
}
