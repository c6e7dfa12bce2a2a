//! In-memory cluster fake.
//!
//! Behaves like the API server for the two calls the scheduler makes:
//! - `list_pods` returns pods of the requested namespace that match the
//!   label selector, in insertion order
//! - `delete_pod` removes the pod, or fails with "not found"
//!
//! Failures can be scripted per call kind and deletions are recorded.
//!
//! # Example
//!
//! ```rust,ignore
//! use chaos_test_utils::FakeCluster;
//!
//! let cluster = FakeCluster::new()
//!     .with_pods(five_pod_scenario("namespace1"))
//!     .failing_lists(1);
//!
//! assert!(cluster.list_pods("namespace1", "").await.is_err());
//! assert_eq!(cluster.list_pods("namespace1", "").await.unwrap().len(), 5);
//! ```

use chaos_monkey::errors::ClusterError;
use chaos_monkey::models::PodSummary;
use chaos_monkey::services::PodClientTrait;
use common::label_selector::LabelSelector;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory cluster shared by clones.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<FakeClusterInner>>,
}

#[derive(Debug, Default)]
struct FakeClusterInner {
    pods: Vec<PodSummary>,
    list_failures: usize,
    delete_failures: usize,
    list_delay: Option<Duration>,
    list_calls: usize,
    /// (namespace, name) of every accepted deletion, in order
    deleted: Vec<(String, String)>,
}

impl FakeCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add pods to the cluster.
    #[must_use]
    pub fn with_pods(self, pods: Vec<PodSummary>) -> Self {
        self.inner.lock().unwrap().pods.extend(pods);
        self
    }

    /// Fail the next `count` list calls.
    #[must_use]
    pub fn failing_lists(self, count: usize) -> Self {
        self.inner.lock().unwrap().list_failures = count;
        self
    }

    /// Fail the next `count` delete calls.
    #[must_use]
    pub fn failing_deletes(self, count: usize) -> Self {
        self.inner.lock().unwrap().delete_failures = count;
        self
    }

    /// Sleep for `delay` inside every list call.
    #[must_use]
    pub fn with_list_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().list_delay = Some(delay);
        self
    }

    /// Add a pod while the cluster is in use.
    pub fn add_pod(&self, pod: PodSummary) {
        self.inner.lock().unwrap().pods.push(pod);
    }

    /// Fail the next `count` list calls, from now on.
    pub fn fail_next_lists(&self, count: usize) {
        self.inner.lock().unwrap().list_failures = count;
    }

    /// Names of pods currently in `namespace`.
    pub fn pods_in(&self, namespace: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|p| p.namespace == namespace)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Names of deleted pods, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .deleted
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// (namespace, name) of deleted pods, in deletion order.
    pub fn deleted_with_namespace(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().deleted.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }
}

#[async_trait::async_trait]
impl PodClientTrait for FakeCluster {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ClusterError> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.list_calls += 1;
            inner.list_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.list_failures > 0 {
            inner.list_failures -= 1;
            return Err(ClusterError::Request(
                "the server is currently unable to handle the request".to_string(),
            ));
        }

        let selector = LabelSelector::parse(label_selector).map_err(|e| {
            ClusterError::Request(format!("unable to parse requirement: {e}"))
        })?;

        Ok(inner
            .pods
            .iter()
            .filter(|p| p.namespace == namespace && selector.matches(&p.labels))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.delete_failures > 0 {
            inner.delete_failures -= 1;
            return Err(ClusterError::Request(format!(
                "pods \"{name}\" is forbidden: injected failure"
            )));
        }

        let position = inner
            .pods
            .iter()
            .position(|p| p.namespace == namespace && p.name == name)
            .ok_or_else(|| ClusterError::Request(format!("pods \"{name}\" not found")))?;

        inner.pods.remove(position);
        inner
            .deleted
            .push((namespace.to_string(), name.to_string()));
        Ok(())
    }
}
