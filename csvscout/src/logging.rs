use tracing_subscriber::EnvFilter;

use crate::errors::{FilterError, FilterResult};

/// Installs a stderr subscriber. `RUST_LOG` wins over `log_level` when set.
pub fn init(log_level: &str) -> FilterResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| {
            FilterError::config_error(format!("invalid log level {:?}: {}", log_level, e))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| FilterError::config_error(e.to_string()))
}
