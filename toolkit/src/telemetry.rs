//! Tracing initialization.
//!
//! Log verbosity follows `RUST_LOG` (standard `EnvFilter` directives) and defaults to `info`:
//!
//! ```bash
//! RUST_LOG=toolkit=debug,tower_http=info toolkit -f config.yaml
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: env filter plus console output (fmt layer).
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
