//! Pod Chaos Monkey error types.
//!
//! `ChaosError` is the taxonomy reported by the scheduler. Construction
//! failures (`Configuration`) propagate to the caller; every other variant is
//! local to a single tick and is reported on the outcome stream while the loop
//! keeps running.

use std::time::Duration;
use thiserror::Error;

/// Failure of a call to the cluster API collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Cluster request failed: {0}")]
    Request(String),

    #[error("Cluster request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to build cluster client: {0}")]
    Bootstrap(String),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        ClusterError::Request(err.to_string())
    }
}

/// Scheduler error taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChaosError {
    /// Invalid schedule or other construction input. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The list call failed (network, auth, throttling, deadline).
    #[error("Failed to list pods in namespace '{namespace}': {source}")]
    List {
        namespace: String,
        #[source]
        source: ClusterError,
    },

    /// The list succeeded but nothing survived filtering.
    #[error("No candidate pod found: {listed} pod(s) listed, none eligible")]
    NoCandidates { listed: usize },

    /// The delete call for the chosen pod failed.
    #[error("Failed to delete pod '{namespace}/{pod}': {source}")]
    Delete {
        namespace: String,
        pod: String,
        #[source]
        source: ClusterError,
    },
}

impl ChaosError {
    /// Bounded classification label, used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChaosError::Configuration(_) => "configuration",
            ChaosError::List { .. } => "list",
            ChaosError::NoCandidates { .. } => "no_candidates",
            ChaosError::Delete { .. } => "delete",
        }
    }
}
