//! Tracing subscriber setup shared by Pod Chaos Monkey binaries.

use crate::config::ObservabilityConfig;
use crate::error::CommonError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_filter`. Output is plain text
/// unless `config.json_logs` is set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), CommonError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| {
            CommonError::Configuration(format!(
                "Invalid log filter '{}': {}",
                config.log_filter, e
            ))
        })?;

    let json_layer = config
        .json_logs
        .then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| CommonError::Configuration(format!("Failed to install subscriber: {e}")))
}
