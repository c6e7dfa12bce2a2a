//! Observability for Pod Chaos Monkey.

pub mod metrics;
