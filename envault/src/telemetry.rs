//! Tracing initialization.
//!
//! Sets up tracing-subscriber with console output and an `EnvFilter`.
//! The filter defaults to `info` and can be overridden with `RUST_LOG`,
//! e.g. `RUST_LOG=envault=debug,sqlx=warn`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing for the process.
///
/// Safe to call once at startup; returns an error if a global subscriber
/// is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
