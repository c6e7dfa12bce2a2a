//! Common configuration types for Pod Chaos Monkey components.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default tracing filter when `RUST_LOG` is not set.
///
/// `chaos` prefix-matches both the `chaos_monkey` crate and `chaos.*` targets.
pub const DEFAULT_LOG_FILTER: &str = "pod_chaos_monkey=info,chaos=info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Fallback `EnvFilter` directive used when `RUST_LOG` is absent
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load observability settings from a map of environment variables.
    ///
    /// Recognizes `LOG_FILTER` and `LOG_FORMAT` (`text` or `json`).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CommonError> {
        let log_filter = vars
            .get("LOG_FILTER")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let json_logs = match vars.get("LOG_FORMAT").map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(format) if format.is_empty() || format == "text" => false,
            Some(format) if format == "json" => true,
            Some(other) => {
                return Err(CommonError::Configuration(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{other}'"
                )))
            }
        };

        Ok(Self {
            log_filter,
            json_logs,
        })
    }
}
