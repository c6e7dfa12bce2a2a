//! Data models for Pod Chaos Monkey.
//!
//! Pod summaries are read-only projections of cluster state. Tick outcomes
//! and failures are ephemeral values emitted by the scheduler, never stored.

use crate::errors::ChaosError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Condition type marking a pod as able to serve traffic.
pub const POD_READY_CONDITION: &str = "Ready";

/// Condition status string for a condition that holds.
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status string for a condition that does not hold.
pub const CONDITION_STATUS_FALSE: &str = "False";

/// One entry of a pod's status condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodCondition {
    pub condition_type: String,
    pub status: String,
}

impl PodCondition {
    /// A `Ready` condition with status `True` or `False`.
    pub fn ready(is_ready: bool) -> Self {
        Self {
            condition_type: POD_READY_CONDITION.to_string(),
            status: if is_ready {
                CONDITION_STATUS_TRUE
            } else {
                CONDITION_STATUS_FALSE
            }
            .to_string(),
        }
    }
}

/// Projection of a pod as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    /// Unique within the namespace.
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub conditions: Vec<PodCondition>,
}

impl PodSummary {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: PodCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// True iff the pod carries a `Ready` condition whose status is `True`.
    pub fn is_ready(&self) -> bool {
        self.conditions.iter().any(|c| {
            c.condition_type == POD_READY_CONDITION && c.status == CONDITION_STATUS_TRUE
        })
    }
}

/// Label selection settings for a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectConfig {
    /// Selector expression; empty selects every pod in the namespace.
    pub labels: String,
}

impl SelectConfig {
    pub fn new(labels: impl Into<String>) -> Self {
        Self {
            labels: labels.into(),
        }
    }
}

/// Result of one list → filter → select → terminate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Deletion of `pod` was accepted by the cluster.
    Terminated { pod: String },
    Failed(ChaosError),
}

impl TickOutcome {
    /// Bounded label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Terminated { .. } => "terminated",
            TickOutcome::Failed(e) => e.kind(),
        }
    }
}

/// A per-tick failure as delivered on the outcome stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaosFailure {
    /// 1-based tick number within the workload's lifetime.
    pub tick: u64,
    pub error: ChaosError,
}

impl ChaosFailure {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for ChaosFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}: {}", self.tick, self.error)
    }
}

/// Lifecycle of a workload: `Idle → Running → Stopped`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}
