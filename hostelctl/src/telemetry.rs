//! Tracing initialization.
//!
//! Log verbosity is controlled through `RUST_LOG` (for example
//! `RUST_LOG=hostelctl=debug,tower_http=info`) and defaults to `info`.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: an env filter in front of the fmt layer.
///
/// Fails if a global subscriber has already been set.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
