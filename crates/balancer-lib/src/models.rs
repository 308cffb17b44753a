//! Core data models for the rebalance agent

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated metric observations over the query window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    pub avg: f64,
    pub p95: f64,
}

/// Configured resource quantities for a pod, straight from its manifest
///
/// Each field holds the raw quantity string (`500m`, `1Gi`) or is absent
/// when the manifest does not set it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub cpu_request: Option<String>,
    pub cpu_limit: Option<String>,
    pub mem_request: Option<String>,
    pub mem_limit: Option<String>,
}

/// One pod's configuration and metric aggregates, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub name: String,
    #[serde(default)]
    pub spec: ResourceSpec,
    /// Metric name (`cpu`, `memory`, `oom_kills`) to its aggregate
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricAggregate>,
}

/// How a pod's utilization was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Overloaded,
    Inconsistent,
    Idle,
    Healthy,
}

/// Remediation action paired with each classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    IncreaseMemoryLimit,
    DecreaseRequests,
    EscalateInconsistent,
    Skip,
}

impl Classification {
    /// The action fixed to this classification
    pub fn action(self) -> RecommendedAction {
        match self {
            Classification::Overloaded => RecommendedAction::IncreaseMemoryLimit,
            Classification::Inconsistent => RecommendedAction::EscalateInconsistent,
            Classification::Idle => RecommendedAction::DecreaseRequests,
            Classification::Healthy => RecommendedAction::Skip,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Overloaded => "overloaded",
            Classification::Inconsistent => "inconsistent",
            Classification::Idle => "idle",
            Classification::Healthy => "healthy",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecommendedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RecommendedAction::IncreaseMemoryLimit => "increase_memory_limit",
            RecommendedAction::DecreaseRequests => "decrease_requests",
            RecommendedAction::EscalateInconsistent => "escalate_inconsistent",
            RecommendedAction::Skip => "skip",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub pod: String,
    pub classification: Classification,
    pub action: RecommendedAction,
    pub reason: String,
}

/// Externally visible run summary, the wire contract for notifications
///
/// The three lists partition the scanned pods: every scanned pod lands in
/// exactly one of them, and `pods_scanned` counts all of them. List entries
/// are kept as raw JSON values so an accepted upstream report passes through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub namespace: String,
    pub pods_scanned: u64,
    pub pods_rebalanced: Vec<serde_json::Value>,
    pub pods_escalated: Vec<serde_json::Value>,
    pub pods_skipped: Vec<serde_json::Value>,
}

/// Raw end-of-run report from the upstream text producer
///
/// `text` is the free-form message body; `payload` is an optional fenced
/// block attached separately, mirroring messaging APIs that carry a body
/// plus block attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReport {
    pub text: String,
    pub payload: Option<String>,
}

impl RawReport {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payload: None,
        }
    }
}

/// Where the final summary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Upstream payload validated, possibly after textual repair
    Upstream,
    /// Upstream discarded; summary rebuilt from the action log
    Synthesized,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Upstream => "upstream",
            Provenance::Synthesized => "synthesized",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema-valid summary plus the message text to post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledReport {
    pub summary: Summary,
    pub display_text: String,
    pub provenance: Provenance,
}

/// Result of one full rebalancing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub namespace: String,
    pub summary: Summary,
    pub display_text: String,
    pub provenance: Provenance,
    pub decisions: Vec<Decision>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
