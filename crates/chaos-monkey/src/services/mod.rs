//! Service layer for Pod Chaos Monkey.
//!
//! This module contains the cluster-facing collaborators and the pure
//! selection logic the scheduler drives.
//!
//! # Components
//!
//! - `kube_client` - Kubernetes client bootstrap (in-cluster or kubeconfig)
//! - `pod_client` - List/delete pod operations behind `PodClientTrait`
//! - `pod_selection` - Candidate filtering and uniform random pick

pub mod kube_client;
pub mod pod_client;
pub mod pod_selection;

pub use kube_client::create_client;
pub use pod_client::{KubePodClient, PodClientTrait};
pub use pod_selection::{pick_candidate, select_candidates};
