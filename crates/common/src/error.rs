//! Common error types for Pod Chaos Monkey components.

use thiserror::Error;

/// Common errors that can occur across Pod Chaos Monkey components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Label selector expression could not be parsed
    #[error("Invalid label selector '{selector}': {reason}")]
    InvalidLabelSelector {
        /// The selector as written by the operator
        selector: String,
        /// What was wrong with it
        reason: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}
