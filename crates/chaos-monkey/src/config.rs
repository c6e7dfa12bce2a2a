//! Pod Chaos Monkey configuration.
//!
//! Configuration is loaded from environment variables and then overridden by
//! the flags of the `run` subcommand. Every value is validated here except
//! the schedule, which `Workload::create` parses.

use crate::tasks::chaos_scheduler::{DEFAULT_API_CALL_TIMEOUT, DEFAULT_OUTCOME_BUFFER};
use clap::{Args, Parser, Subcommand};
use common::error::CommonError;
use common::label_selector::LabelSelector;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Default namespace to monitor.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default tick interval.
pub const DEFAULT_SCHEDULE: &str = "10s";

const ENV_NAMESPACE: &str = "NAME_SPACE";
const ENV_SCHEDULE: &str = "SCHEDULE";
const ENV_LABELS: &str = "LABELS";
const ENV_SELF_POD_NAME: &str = "MY_POD_NAME";
const ENV_KUBE_CONFIG: &str = "KUBE_CONFIG";
const ENV_OUTCOME_BUFFER: &str = "OUTCOME_BUFFER";
const ENV_API_TIMEOUT: &str = "API_TIMEOUT";
const ENV_METRICS_BIND_ADDRESS: &str = "METRICS_BIND_ADDRESS";

/// Pod Chaos Monkey configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to list and delete pods in (default: "default").
    pub namespace: String,

    /// Tick interval as a duration string (default: "10s").
    pub schedule: String,

    /// Label selector; empty selects every pod.
    pub label_selector: String,

    /// Name of the pod this process runs in; empty disables self-exclusion.
    pub self_pod_name: String,

    /// Path to a kubeconfig file; empty means in-cluster configuration.
    pub kube_config: String,

    /// Capacity of the failure stream.
    pub outcome_buffer: usize,

    /// Deadline for each list and delete call.
    pub api_timeout: Duration,

    /// Prometheus scrape endpoint; disabled when unset.
    pub metrics_bind_address: Option<SocketAddr>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid namespace configuration: {0}")]
    InvalidNamespace(String),

    #[error("Invalid label selector configuration: {0}")]
    InvalidLabelSelector(#[source] CommonError),

    #[error("Invalid outcome buffer configuration: {0}")]
    InvalidOutcomeBuffer(String),

    #[error("Invalid API timeout configuration: {0}")]
    InvalidApiTimeout(String),

    #[error("Invalid metrics bind address configuration: {0}")]
    InvalidMetricsBindAddress(String),
}

impl Config {
    /// Load configuration from environment variables, then apply CLI overrides.
    pub fn load(args: &RunArgs) -> Result<Self, ConfigError> {
        let mut vars: HashMap<String, String> = env::vars().collect();
        args.apply_to(&mut vars);
        Self::from_vars(&vars)
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        let namespace = get(ENV_NAMESPACE).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if namespace.is_empty() {
            return Err(ConfigError::InvalidNamespace(format!(
                "{ENV_NAMESPACE} must not be empty"
            )));
        }

        let schedule = get(ENV_SCHEDULE)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string());

        // Reject a malformed selector at startup instead of on every tick
        let label_selector = get(ENV_LABELS).unwrap_or_default();
        LabelSelector::parse(&label_selector).map_err(ConfigError::InvalidLabelSelector)?;

        let self_pod_name = get(ENV_SELF_POD_NAME).unwrap_or_default();
        let kube_config = get(ENV_KUBE_CONFIG).unwrap_or_default();

        let outcome_buffer = if let Some(value_str) = get(ENV_OUTCOME_BUFFER) {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidOutcomeBuffer(format!(
                    "{ENV_OUTCOME_BUFFER} must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidOutcomeBuffer(format!(
                    "{ENV_OUTCOME_BUFFER} must be greater than 0"
                )));
            }

            value
        } else {
            DEFAULT_OUTCOME_BUFFER
        };

        let api_timeout = if let Some(value_str) = get(ENV_API_TIMEOUT) {
            let value = humantime::parse_duration(&value_str).map_err(|e| {
                ConfigError::InvalidApiTimeout(format!(
                    "{ENV_API_TIMEOUT} must be a duration such as '30s', got '{value_str}': {e}"
                ))
            })?;

            if value.is_zero() {
                return Err(ConfigError::InvalidApiTimeout(format!(
                    "{ENV_API_TIMEOUT} must be greater than 0"
                )));
            }

            value
        } else {
            DEFAULT_API_CALL_TIMEOUT
        };

        let metrics_bind_address = match get(ENV_METRICS_BIND_ADDRESS).filter(|s| !s.is_empty()) {
            Some(value_str) => Some(value_str.parse().map_err(|e| {
                ConfigError::InvalidMetricsBindAddress(format!(
                    "{ENV_METRICS_BIND_ADDRESS} must be a socket address, got '{value_str}': {e}"
                ))
            })?),
            None => None,
        };

        Ok(Config {
            namespace,
            schedule,
            label_selector,
            self_pod_name,
            kube_config,
            outcome_buffer,
            api_timeout,
            metrics_bind_address,
        })
    }
}

/// Command line interface.
#[derive(Parser, Debug)]
#[command(name = "pod-chaos-monkey")]
#[command(version, about = "Run the pod chaos monkey process", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Periodically delete a random ready pod until interrupted
    Run(RunArgs),
}

/// Flags of the `run` subcommand. Each one overrides its environment variable.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Label selector with `kubectl label ...` syntax
    #[arg(long, short = 'l')]
    pub label_selector: Option<String>,

    /// Path to kube config file
    #[arg(long, short = 'k')]
    pub kube_config: Option<String>,

    /// Namespace to monitor and delete pods
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Schedule to run the process, in duration string format e.g 10s, 1h
    #[arg(long, short = 's')]
    pub schedule: Option<String>,

    /// Name of the pod this process runs in, never deleted
    #[arg(long)]
    pub self_pod_name: Option<String>,
}

impl RunArgs {
    /// Write every flag that was given over its environment variable.
    pub fn apply_to(&self, vars: &mut HashMap<String, String>) {
        let overrides = [
            (ENV_LABELS, &self.label_selector),
            (ENV_KUBE_CONFIG, &self.kube_config),
            (ENV_NAMESPACE, &self.namespace),
            (ENV_SCHEDULE, &self.schedule),
            (ENV_SELF_POD_NAME, &self.self_pod_name),
        ];

        for (key, value) in overrides {
            if let Some(value) = value {
                vars.insert(key.to_string(), value.clone());
            }
        }
    }
}
