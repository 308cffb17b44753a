//! Agent configuration

use std::time::Duration;

use anyhow::Result;
use balancer_lib::classifier::Thresholds;
use balancer_lib::orchestrator::{RunConfig, ScalePolicy, DEFAULT_METRICS_WINDOW};
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Namespace whose pods are rebalanced
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Channel the run report is posted to
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Lookback window for metric queries
    #[serde(default = "default_metrics_window")]
    pub metrics_window: String,

    /// Producer call timeout in seconds
    #[serde(default = "default_producer_timeout")]
    pub producer_timeout_secs: u64,

    /// Factor applied to the memory limit of overloaded pods
    #[serde(default = "default_memory_increase")]
    pub memory_increase: f64,

    /// Factor applied to the requests of idle pods
    #[serde(default = "default_request_decrease")]
    pub request_decrease: f64,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_channel() -> String {
    "#platform-notifications".to_string()
}

fn default_metrics_window() -> String {
    DEFAULT_METRICS_WINDOW.to_string()
}

fn default_producer_timeout() -> u64 {
    30
}

fn default_memory_increase() -> f64 {
    1.25
}

fn default_request_decrease() -> f64 {
    0.8
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("REBALANCER"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| AgentConfig {
            namespace: default_namespace(),
            channel: default_channel(),
            metrics_window: default_metrics_window(),
            producer_timeout_secs: default_producer_timeout(),
            memory_increase: default_memory_increase(),
            request_decrease: default_request_decrease(),
        }))
    }

    /// Runtime configuration for the orchestrator
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            namespace: self.namespace.clone(),
            channel: self.channel.clone(),
            metrics_window: self.metrics_window.clone(),
            producer_timeout: Duration::from_secs(self.producer_timeout_secs),
            scale_policy: ScalePolicy {
                memory_increase: self.memory_increase,
                request_decrease: self.request_decrease,
            },
            thresholds: Thresholds::default(),
        }
    }
}
