//! Telemetry initialization: stdout tracing subscriber filtered by `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset; `log_level` applies to this crate.
fn default_filter(log_level: &str) -> String {
    format!(
        "access_console_backend={},tower_http=debug,sqlx::query=warn",
        log_level
    )
}

/// Initialize the tracing subscriber.
pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(log_level).into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
