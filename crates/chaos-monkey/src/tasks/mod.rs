//! Background tasks.

pub mod chaos_scheduler;

pub use chaos_scheduler::{
    parse_interval, ChaosHandle, Workload, DEFAULT_API_CALL_TIMEOUT, DEFAULT_OUTCOME_BUFFER,
};
