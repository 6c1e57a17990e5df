//! Logging setup using `tracing` + `tracing-subscriber`, with task spans shown
//! as progress bars through `tracing-indicatif`.
//!
//! The filter comes from the `FRONTKIT_LOG` environment variable, in the
//! `EnvFilter` syntax (e.g. `debug`, `frontkit=trace`), defaulting to `info`.

use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "FRONTKIT_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init() -> Result<(), TryInitError> {
    let indicatif = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .try_init()
}
