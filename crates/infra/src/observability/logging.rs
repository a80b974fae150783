//! Logging subscriber setup
//!
//! `RUST_LOG` controls levels (e.g. `info`, `costsync_infra=debug`); the
//! default is `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Human-readable single-line logs.
    #[default]
    Plain,
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; if a subscriber is already installed the
/// call is a no-op and returns `false`.
pub fn init(format: LogFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(env_filter).with(fmt::layer().json()).try_init()
        }
        LogFormat::Plain => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    result.is_ok()
}
