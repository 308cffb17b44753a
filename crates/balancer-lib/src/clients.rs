//! Client traits the orchestrator drives
//!
//! Each trait is one external surface: the cluster control plane, the
//! ticket tracker, the notification channel, and the free-text producer.
//! Implementations live behind `Arc<dyn Trait>` so runs can mix real and
//! fixture backends.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::action_log::ActionLog;
use crate::models::{MetricAggregate, PodSnapshot, RawReport, ResourceSpec};

pub use async_trait::async_trait;

/// Resource fields to change on a pod, absent fields left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceChanges {
    pub cpu_request: Option<String>,
    pub cpu_limit: Option<String>,
    pub mem_request: Option<String>,
    pub mem_limit: Option<String>,
}

impl ResourceChanges {
    /// Present fields as a name-to-value map
    pub fn changed_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        let pairs = [
            ("cpu_request", &self.cpu_request),
            ("cpu_limit", &self.cpu_limit),
            ("mem_request", &self.mem_request),
            ("mem_limit", &self.mem_limit),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                fields.insert(name.to_string(), value.clone());
            }
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_request.is_none()
            && self.cpu_limit.is_none()
            && self.mem_request.is_none()
            && self.mem_limit.is_none()
    }
}

/// Ticket created for an escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub url: String,
}

/// Cluster control plane: pod discovery, descriptions, metrics, updates
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>>;

    async fn describe_pod(&self, pod: &str) -> Result<ResourceSpec>;

    /// One metric aggregate over a lookback window, `None` when the
    /// backend has no series for this pod and metric
    async fn query_metrics(
        &self,
        pod: &str,
        metric: &str,
        window: &str,
    ) -> Result<Option<MetricAggregate>>;

    async fn update_resources(&self, pod: &str, changes: &ResourceChanges) -> Result<()>;
}

/// Ticket tracker used for escalations
#[async_trait]
pub trait TicketSink: Send + Sync {
    async fn create_ticket(&self, title: &str, body: &str) -> Result<Ticket>;
}

/// Notification channel the final report is posted to
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str, payload: Option<&str>) -> Result<()>;
}

/// Free-text producer consulted for advisories and the run report
///
/// Its output is never trusted: advisories are schema-validated before
/// use and reports are reconciled against the action log.
#[async_trait]
pub trait TextProducer: Send + Sync {
    /// Classification advisory for a snapshot without metrics
    async fn advise(&self, snapshot: &PodSnapshot) -> Result<String>;

    /// Narrative run report for the finished action log
    async fn report(&self, namespace: &str, log: &ActionLog) -> Result<RawReport>;
}
