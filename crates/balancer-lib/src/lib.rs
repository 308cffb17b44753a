//! Balancer library for namespace resource rebalancing
//!
//! This crate provides the core functionality for:
//! - Resource quantity parsing, scaling, and formatting
//! - Threshold-based pod classification with an advisory path
//! - Append-only action logging
//! - Run report synthesis and reconciliation
//! - Orchestration of one rebalancing pass over pluggable clients

pub mod action_log;
pub mod classifier;
pub mod clients;
pub mod fixtures;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod quantity;
pub mod report;

pub use action_log::{ActionLog, ActionLogEntry};
pub use classifier::{classify, Outcome, Thresholds};
pub use models::*;
pub use observability::RunLogger;
pub use orchestrator::{Orchestrator, RunConfig, ScalePolicy, DEFAULT_METRICS_WINDOW};
pub use report::{reconcile, synthesize};
