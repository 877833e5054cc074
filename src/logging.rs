use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{DashQueryError, Result};

/// Builds the filter used when `RUST_LOG` is not set.
pub fn default_filter(service: &str) -> String {
    format!("{}={}", service.replace('-', "_"), Level::INFO)
}

/// Sets up the logging subscriber for the service.
///
/// # Arguments
/// * `service` - Crate/target name that gets `info` level by default
pub fn init_logger(service: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(service)));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .with_ansi(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| DashQueryError::Internal(format!("Failed to initialize logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter("dashquery"), "dashquery=INFO");
        assert_eq!(default_filter("dash-query"), "dash_query=INFO");
    }
}
