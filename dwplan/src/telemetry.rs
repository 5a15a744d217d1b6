//! Tracing setup.
//!
//! Log verbosity follows `RUST_LOG` (default `info`). Routing decisions are logged at `debug`,
//! dropped metrics, filters and dimensions at `warn`, e.g.
//!
//! ```bash
//! RUST_LOG=dwplan=debug dwplan -r request.json
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Initialize tracing with a console layer in the configured format.
///
/// Logs go to stderr so the planned query on stdout stays machine-readable.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
    }

    info!(?format, "Telemetry initialized");
    Ok(())
}
