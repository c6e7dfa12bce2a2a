//! Pod Chaos Monkey Library
//!
//! Periodically terminates one randomly chosen, ready pod in a namespace to
//! exercise an application's resilience to pod loss.
//!
//! # Architecture
//!
//! Each tick is a straight pipeline over the cluster collaborator:
//!
//! ```text
//! tasks/chaos_scheduler.rs -> services/pod_client.rs (list)
//!                          -> services/pod_selection.rs (filter, pick)
//!                          -> services/pod_client.rs (delete)
//! ```
//!
//! Per-tick failures are reported on the workload's outcome stream and never
//! stop the loop. Cancellation is cooperative and observed between ticks.
//!
//! # Modules
//!
//! - `config` - Process configuration from environment and CLI flags
//! - `errors` - Error taxonomy
//! - `models` - Pod projections, tick outcomes, scheduler state
//! - `observability` - Prometheus metrics
//! - `services` - Cluster collaborator and victim selection
//! - `tasks` - The chaos scheduler background task

pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod services;
pub mod tasks;
