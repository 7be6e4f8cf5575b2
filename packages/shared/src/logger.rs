//! Logging setup utilities for the messaging server and client.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Filters are set for the calling binary and for every workspace crate, so
/// library logs show up next to the binary's own. `RUST_LOG` takes precedence
/// when it is set.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "biblioteca-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use biblioteca_shared::logger::setup_logger;
///
/// setup_logger("biblioteca-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_filter(binary_name: &str, level: &str) -> String {
    format!(
        "biblioteca_shared={level},biblioteca_server={level},biblioteca_client={level},{}={level},tower_http=info",
        binary_name.replace('-', "_"),
    )
}
