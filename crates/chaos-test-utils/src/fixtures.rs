//! Pod fixtures.
//!
//! `TestPod` builds `PodSummary` values the way they come back from the
//! cluster, and `five_pod_scenario` is the canonical end-to-end inventory:
//!
//! | pod  | labels          | ready |
//! |------|-----------------|-------|
//! | pod1 | label1=value1   | yes   |
//! | pod2 | label1=value2   | yes   |
//! | pod3 | (none)          | yes   |
//! | pod4 | label1=value2   | yes   |
//! | pod5 | label1=value2   | no    |

use chaos_monkey::models::{PodCondition, PodSummary};

/// Builder for a test pod.
#[derive(Debug, Clone)]
pub struct TestPod {
    pod: PodSummary,
}

impl TestPod {
    /// A pod with no labels and no conditions (never ready).
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            pod: PodSummary::new(name, namespace),
        }
    }

    #[must_use]
    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.pod = self.pod.with_label(key, value);
        self
    }

    /// Add a `Ready=True` condition.
    #[must_use]
    pub fn ready(mut self) -> Self {
        self.pod = self.pod.with_condition(PodCondition::ready(true));
        self
    }

    /// Add a `Ready=False` condition.
    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.pod = self.pod.with_condition(PodCondition::ready(false));
        self
    }

    /// Add an arbitrary condition.
    #[must_use]
    pub fn condition(mut self, condition_type: &str, status: &str) -> Self {
        self.pod = self.pod.with_condition(PodCondition {
            condition_type: condition_type.to_string(),
            status: status.to_string(),
        });
        self
    }

    pub fn build(self) -> PodSummary {
        self.pod
    }
}

/// Ready pod with a single label, the most common fixture.
pub fn ready_pod(name: &str, namespace: &str, key: &str, value: &str) -> PodSummary {
    TestPod::new(name, namespace).label(key, value).ready().build()
}

/// The standard five-pod inventory (see module docs).
pub fn five_pod_scenario(namespace: &str) -> Vec<PodSummary> {
    vec![
        TestPod::new("pod1", namespace)
            .label("label1", "value1")
            .ready()
            .build(),
        TestPod::new("pod2", namespace)
            .label("label1", "value2")
            .ready()
            .build(),
        TestPod::new("pod3", namespace).ready().build(),
        TestPod::new("pod4", namespace)
            .label("label1", "value2")
            .ready()
            .build(),
        TestPod::new("pod5", namespace)
            .label("label1", "value2")
            .not_ready()
            .build(),
    ]
}

/// The three unconditioned pods used for selector pass-through checks.
pub fn labelled_pods(namespace: &str) -> Vec<PodSummary> {
    vec![
        TestPod::new("pod1", namespace).label("label1", "value1").build(),
        TestPod::new("pod2", namespace).label("label1", "value2").build(),
        TestPod::new("pod3", namespace).build(),
    ]
}
