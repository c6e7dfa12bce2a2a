//! # Chaos Test Utilities
//!
//! Shared test utilities for Pod Chaos Monkey.
//!
//! This crate provides an in-memory cluster fake and pod fixtures for
//! exercising the scheduler without a real Kubernetes API server.
//!
//! ## Modules
//!
//! - `fake_cluster` - In-memory `PodClientTrait` with namespace and label
//!   selector semantics, injectable failures and recorded deletions
//! - `fixtures` - Pod builders and the standard five-pod scenario
//! - `eventual` - Polling assertions for timing-dependent tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chaos_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let cluster = FakeCluster::new().with_pods(five_pod_scenario("namespace1"));
//!     let client: Arc<dyn PodClientTrait> = Arc::new(cluster.clone());
//!
//!     // Build a Workload over `client` and assert on `cluster.deleted()`...
//! }
//! ```

pub mod eventual;
pub mod fake_cluster;
pub mod fixtures;

// Re-export commonly used items
pub use eventual::*;
pub use fake_cluster::*;
pub use fixtures::*;
