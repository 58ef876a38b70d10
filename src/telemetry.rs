// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "pulse_portal=info,warn";
pub const ENV_LOG_JSON: &str = "PULSE_LOG_JSON";

/// Install the global subscriber: `RUST_LOG` filter (or the default),
/// compact text, or JSON lines when `PULSE_LOG_JSON=1`.
///
/// No-op if a subscriber is already installed (e.g. by the hosting runtime).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(ENV_LOG_JSON)
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already set");
    }
}
