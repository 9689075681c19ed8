//! Structured logging setup.
//!
//! The framework itself only emits `tracing` events; installing a subscriber
//! is the application's choice. These helpers configure a sensible default
//! for binaries and tests that don't bring their own.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber honoring `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Install a formatting subscriber with an explicit default level, still
/// overridable through `RUST_LOG`.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
