//! Observability infrastructure for the rebalance agent
//!
//! Structured JSON logging with tracing for decisions, updates,
//! escalations, and run completion.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clients::ResourceChanges;
use crate::models::{Decision, Provenance, Summary};

/// Structured logger for run events
///
/// Provides consistent JSON-formatted logging for classification
/// decisions, resource updates, escalations, and report reconciliation.
#[derive(Clone)]
pub struct RunLogger {
    namespace: String,
}

impl RunLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Log a classification decision for one pod
    pub fn log_decision(&self, decision: &Decision) {
        info!(
            event = "pod_classified",
            namespace = %self.namespace,
            pod = %decision.pod,
            classification = %decision.classification,
            action = %decision.action,
            reason = %decision.reason,
            "Classified pod"
        );
    }

    /// Log an applied resource update
    pub fn log_rebalance(&self, pod: &str, changes: &ResourceChanges) {
        info!(
            event = "pod_rebalanced",
            namespace = %self.namespace,
            pod = %pod,
            cpu_request = ?changes.cpu_request,
            cpu_limit = ?changes.cpu_limit,
            mem_request = ?changes.mem_request,
            mem_limit = ?changes.mem_limit,
            "Applied resource update"
        );
    }

    /// Log an escalation ticket
    pub fn log_escalation(&self, pod: &str, ticket_url: &str, reason: &str) {
        warn!(
            event = "pod_escalated",
            namespace = %self.namespace,
            pod = %pod,
            ticket_url = %ticket_url,
            reason = %reason,
            "Escalated pod for manual review"
        );
    }

    /// Log rejection of the upstream report
    pub fn log_report_fallback(&self) {
        warn!(
            event = "report_fallback",
            namespace = %self.namespace,
            "Upstream report rejected, summary rebuilt from the action log"
        );
    }

    /// Log run completion
    pub fn log_run_complete(
        &self,
        summary: &Summary,
        provenance: Provenance,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) {
        info!(
            event = "run_complete",
            namespace = %self.namespace,
            pods_scanned = summary.pods_scanned,
            pods_rebalanced = summary.pods_rebalanced.len(),
            pods_escalated = summary.pods_escalated.len(),
            pods_skipped = summary.pods_skipped.len(),
            provenance = %provenance,
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "Rebalance run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let logger = RunLogger::new("default");
        assert_eq!(logger.namespace, "default");
    }
}
