//! Cluster API collaborator for pod inventory and termination.
//!
//! The scheduler only needs two stateless calls, list and delete, so they
//! sit behind `PodClientTrait`. `KubePodClient` is the production
//! implementation on top of a shared `kube::Client`; `mock::MockPodClient`
//! scripts responses for unit tests.

use crate::errors::ClusterError;
use crate::models::{PodCondition, PodSummary};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams};
use kube::Client;
use tracing::debug;

/// Trait for pod operations against the cluster (enables mocking).
#[async_trait::async_trait]
pub trait PodClientTrait: Send + Sync {
    /// List pods in `namespace`. An empty `label_selector` means no filtering.
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ClusterError>;

    /// Request deletion of pod `name` in `namespace`.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Pod client backed by the Kubernetes API server.
///
/// `kube::Client` is a cheap handle over a shared connection pool; cloning
/// it per request does not open new connections.
#[derive(Clone)]
pub struct KubePodClient {
    client: Client,
}

impl KubePodClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait::async_trait]
impl PodClientTrait for KubePodClient {
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodSummary>, ClusterError> {
        let mut params = ListParams::default();
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }

        let list = self.pods(namespace).list(&params).await?;

        debug!(
            target: "chaos.services.pod_client",
            namespace = %namespace,
            label_selector = %label_selector,
            pod_count = list.items.len(),
            "Listed pods"
        );

        Ok(list.items.iter().map(PodSummary::from).collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        // Either the deleted object or a Status; both mean the API accepted it.
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await?;

        debug!(
            target: "chaos.services.pod_client",
            namespace = %namespace,
            pod = %name,
            "Pod deletion accepted"
        );
        Ok(())
    }
}

impl From<&Pod> for PodSummary {
    fn from(pod: &Pod) -> Self {
        let conditions = pod
            .status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .map(|c| PodCondition {
                        condition_type: c.type_.clone(),
                        status: c.status.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        PodSummary {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            conditions,
        }
    }
}

/// Mock pod client module for testing.
///
/// This module provides a scripted implementation of `PodClientTrait` for
/// unit tests that do not need label selector semantics.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Mock pod client for unit testing.
    pub struct MockPodClient {
        /// Pods returned by every successful list (deleted pods are removed).
        pods: Mutex<Vec<PodSummary>>,
        /// Number of upcoming list calls that fail.
        list_failures: AtomicUsize,
        /// Number of upcoming delete calls that fail.
        delete_failures: AtomicUsize,
        /// Artificial latency applied to every list call.
        list_delay: Option<Duration>,
        list_calls: AtomicUsize,
        deleted: Mutex<Vec<String>>,
    }

    impl MockPodClient {
        /// Create a mock that lists the given pods.
        pub fn with_pods(pods: Vec<PodSummary>) -> Self {
            Self {
                pods: Mutex::new(pods),
                list_failures: AtomicUsize::new(0),
                delete_failures: AtomicUsize::new(0),
                list_delay: None,
                list_calls: AtomicUsize::new(0),
                deleted: Mutex::new(Vec::new()),
            }
        }

        /// Fail the next `count` list calls.
        #[must_use]
        pub fn failing_lists(self, count: usize) -> Self {
            self.list_failures.store(count, Ordering::SeqCst);
            self
        }

        /// Fail the next `count` delete calls.
        #[must_use]
        pub fn failing_deletes(self, count: usize) -> Self {
            self.delete_failures.store(count, Ordering::SeqCst);
            self
        }

        /// Sleep for `delay` inside every list call.
        #[must_use]
        pub fn with_list_delay(mut self, delay: Duration) -> Self {
            self.list_delay = Some(delay);
            self
        }

        /// Get the number of list calls made.
        pub fn list_calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }

        /// Names of pods deleted so far, in order.
        pub fn deleted(&self) -> Vec<String> {
            self.deleted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn take_failure(counter: &AtomicUsize) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait::async_trait]
    impl PodClientTrait for MockPodClient {
        async fn list_pods(
            &self,
            _namespace: &str,
            _label_selector: &str,
        ) -> Result<Vec<PodSummary>, ClusterError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.list_delay {
                tokio::time::sleep(delay).await;
            }

            if Self::take_failure(&self.list_failures) {
                return Err(ClusterError::Request("Mock list error".to_string()));
            }

            Ok(self
                .pods
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        }

        async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
            if Self::take_failure(&self.delete_failures) {
                return Err(ClusterError::Request("Mock delete error".to_string()));
            }

            self.pods
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|p| p.name != name);
            self.deleted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(name.to_string());
            Ok(())
        }
    }

}
