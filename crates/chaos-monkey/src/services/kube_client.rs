//! Kubernetes client bootstrap.
//!
//! An empty kubeconfig path means the process runs inside the cluster and
//! uses the mounted service account; otherwise the current context of the
//! given kubeconfig file is used.

use crate::errors::ClusterError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

/// Build a `kube::Client` from either in-cluster or file configuration.
///
/// # Errors
///
/// - `ClusterError::Bootstrap` - configuration could not be resolved or the
///   client could not be constructed
pub async fn create_client(kube_config_path: &str) -> Result<Client, ClusterError> {
    let config = if kube_config_path.is_empty() {
        info!(
            target: "chaos.services.kube_client",
            "Using in-cluster Kubernetes configuration"
        );
        Config::incluster().map_err(|e| {
            ClusterError::Bootstrap(format!("in-cluster configuration unavailable: {e}"))
        })?
    } else {
        info!(
            target: "chaos.services.kube_client",
            kube_config = %kube_config_path,
            "Using Kubernetes configuration file"
        );
        let kubeconfig = Kubeconfig::read_from(kube_config_path).map_err(|e| {
            ClusterError::Bootstrap(format!(
                "failed to read kubeconfig '{kube_config_path}': {e}"
            ))
        })?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                ClusterError::Bootstrap(format!(
                    "invalid kubeconfig '{kube_config_path}': {e}"
                ))
            })?
    };

    Client::try_from(config)
        .map_err(|e| ClusterError::Bootstrap(format!("failed to create client: {e}")))
}
