//! Common utilities and types shared across Pod Chaos Monkey crates.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for common configuration
pub mod config;

/// Module for label selector parsing and matching
pub mod label_selector;

/// Module for tracing subscriber setup
pub mod observability;
