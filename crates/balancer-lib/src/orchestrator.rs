//! Run orchestration over the client seams
//!
//! One run walks every pod in the configured namespace: snapshot, classify,
//! apply, then reconcile and post the report. Producer calls are bounded by
//! a timeout and never fail the run; cluster, ticket, and notifier failures
//! propagate to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::action_log::{ActionLog, ActionLogEntry};
use crate::classifier::{classify, Thresholds, RECOGNIZED_METRICS};
use crate::clients::{ClusterClient, Notifier, ResourceChanges, TextProducer, TicketSink};
use crate::models::{Decision, PodSnapshot, Provenance, RawReport, RecommendedAction, RunOutcome};
use crate::observability::RunLogger;
use crate::quantity::scale_quantity;
use crate::report::{reconcile, summary_block};

/// Default lookback window for metric queries
pub const DEFAULT_METRICS_WINDOW: &str = "24h";

/// Scale factors applied by rebalancing actions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePolicy {
    /// Factor applied to the memory limit of overloaded pods
    pub memory_increase: f64,
    /// Factor applied to the requests of idle pods
    pub request_decrease: f64,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            memory_increase: 1.25,
            request_decrease: 0.8,
        }
    }
}

/// Configuration for one rebalancing run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub namespace: String,
    pub channel: String,
    pub metrics_window: String,
    /// Upper bound on each producer call; expiry falls back, never fails
    pub producer_timeout: Duration,
    pub scale_policy: ScalePolicy,
    pub thresholds: Thresholds,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            channel: "#platform-notifications".to_string(),
            metrics_window: DEFAULT_METRICS_WINDOW.to_string(),
            producer_timeout: Duration::from_secs(30),
            scale_policy: ScalePolicy::default(),
            thresholds: Thresholds::default(),
        }
    }
}

/// Drives one namespace rebalancing pass over pluggable clients
pub struct Orchestrator {
    cluster: Arc<dyn ClusterClient>,
    tickets: Arc<dyn TicketSink>,
    notifier: Arc<dyn Notifier>,
    producer: Arc<dyn TextProducer>,
    config: RunConfig,
    logger: RunLogger,
}

impl Orchestrator {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        tickets: Arc<dyn TicketSink>,
        notifier: Arc<dyn Notifier>,
        producer: Arc<dyn TextProducer>,
        config: RunConfig,
    ) -> Self {
        let logger = RunLogger::new(config.namespace.clone());
        Self {
            cluster,
            tickets,
            notifier,
            producer,
            config,
            logger,
        }
    }

    /// Run one full rebalancing pass over the configured namespace
    pub async fn run(&self) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let namespace = self.config.namespace.as_str();

        let pods = self
            .cluster
            .list_pods(namespace)
            .await
            .with_context(|| format!("listing pods in {namespace}"))?;

        let mut log = ActionLog::new();
        let mut decisions = Vec::with_capacity(pods.len());

        for pod in &pods {
            let snapshot = self.build_snapshot(pod).await?;
            let advisory = self.maybe_advisory(&snapshot).await;
            let decision = classify(&snapshot, advisory.as_ref(), &self.config.thresholds);
            self.logger.log_decision(&decision);
            self.apply(&decision, &snapshot, &mut log).await?;
            decisions.push(decision);
        }

        let report = self.producer_report(&log).await;
        let reconciled = reconcile(&report, &log, namespace, &pods);
        if reconciled.provenance == Provenance::Synthesized {
            self.logger.log_report_fallback();
        }

        self.notifier
            .post_message(
                &self.config.channel,
                &reconciled.display_text,
                Some(&summary_block(&reconciled.summary)),
            )
            .await
            .context("posting run report")?;

        let finished_at = Utc::now();
        self.logger.log_run_complete(
            &reconciled.summary,
            reconciled.provenance,
            started_at,
            finished_at,
        );

        Ok(RunOutcome {
            namespace: namespace.to_string(),
            summary: reconciled.summary,
            display_text: reconciled.display_text,
            provenance: reconciled.provenance,
            decisions,
            started_at,
            finished_at,
        })
    }

    async fn build_snapshot(&self, pod: &str) -> Result<PodSnapshot> {
        let spec = self
            .cluster
            .describe_pod(pod)
            .await
            .with_context(|| format!("describing pod {pod}"))?;

        let mut metrics = BTreeMap::new();
        for metric in RECOGNIZED_METRICS {
            let aggregate = self
                .cluster
                .query_metrics(pod, metric, &self.config.metrics_window)
                .await
                .with_context(|| format!("querying {metric} metrics for {pod}"))?;
            if let Some(aggregate) = aggregate {
                metrics.insert(metric.to_string(), aggregate);
            }
        }

        Ok(PodSnapshot {
            name: pod.to_string(),
            spec,
            metrics,
        })
    }

    /// Ask the producer for an advisory when the snapshot carries no metrics
    ///
    /// Advisory failures never fail the run; the classifier defaults the
    /// pod to healthy/skip instead.
    async fn maybe_advisory(&self, snapshot: &PodSnapshot) -> Option<Value> {
        if !snapshot.metrics.is_empty() {
            return None;
        }

        let advice =
            tokio::time::timeout(self.config.producer_timeout, self.producer.advise(snapshot))
                .await;

        let text = match advice {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                warn!(
                    event = "advisory_failed",
                    pod = %snapshot.name,
                    error = %error,
                    "Advisory request failed"
                );
                return None;
            }
            Err(_) => {
                warn!(
                    event = "advisory_timeout",
                    pod = %snapshot.name,
                    "Advisory request timed out"
                );
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(
                    event = "advisory_unparsable",
                    pod = %snapshot.name,
                    error = %error,
                    "Advisory was not JSON, ignoring it"
                );
                None
            }
        }
    }

    async fn apply(
        &self,
        decision: &Decision,
        snapshot: &PodSnapshot,
        log: &mut ActionLog,
    ) -> Result<()> {
        match decision.action {
            RecommendedAction::IncreaseMemoryLimit => {
                let changes = ResourceChanges {
                    mem_limit: scale_quantity(
                        snapshot.spec.mem_limit.as_deref(),
                        self.config.scale_policy.memory_increase,
                    ),
                    ..ResourceChanges::default()
                };
                self.rebalance(&decision.pod, changes, log).await
            }
            RecommendedAction::DecreaseRequests => {
                let factor = self.config.scale_policy.request_decrease;
                let changes = ResourceChanges {
                    cpu_request: scale_quantity(snapshot.spec.cpu_request.as_deref(), factor),
                    mem_request: scale_quantity(snapshot.spec.mem_request.as_deref(), factor),
                    ..ResourceChanges::default()
                };
                self.rebalance(&decision.pod, changes, log).await
            }
            RecommendedAction::EscalateInconsistent => {
                self.escalate(decision, snapshot, log).await
            }
            RecommendedAction::Skip => {
                log.record(ActionLogEntry::Skipped {
                    pod: decision.pod.clone(),
                    reason: decision.reason.clone(),
                });
                Ok(())
            }
        }
    }

    async fn rebalance(
        &self,
        pod: &str,
        changes: ResourceChanges,
        log: &mut ActionLog,
    ) -> Result<()> {
        // A pod with no scalable quantities produces no update and no entry;
        // it surfaces through the skipped bucket at synthesis time.
        if changes.is_empty() {
            debug!(
                event = "rebalance_noop",
                pod = %pod,
                "No scalable quantities on pod, leaving it untouched"
            );
            return Ok(());
        }

        self.cluster
            .update_resources(pod, &changes)
            .await
            .with_context(|| format!("updating resources for {pod}"))?;
        self.logger.log_rebalance(pod, &changes);
        log.record(ActionLogEntry::Rebalanced {
            pod: pod.to_string(),
            changed_fields: changes.changed_fields(),
        });
        Ok(())
    }

    async fn escalate(
        &self,
        decision: &Decision,
        snapshot: &PodSnapshot,
        log: &mut ActionLog,
    ) -> Result<()> {
        let title = format!(
            "Inconsistent metrics for {} in {}",
            decision.pod, self.config.namespace
        );
        let body = escalation_body(decision, snapshot);

        let ticket = self
            .tickets
            .create_ticket(&title, &body)
            .await
            .with_context(|| format!("creating escalation ticket for {}", decision.pod))?;
        self.logger
            .log_escalation(&decision.pod, &ticket.url, &decision.reason);
        log.record(ActionLogEntry::Escalated {
            pod: decision.pod.clone(),
            reason: body,
            ticket_url: ticket.url,
        });
        Ok(())
    }

    /// Request the end-of-run report, degrading to an empty report on
    /// timeout or error so reconciliation can synthesize
    async fn producer_report(&self, log: &ActionLog) -> RawReport {
        let request = tokio::time::timeout(
            self.config.producer_timeout,
            self.producer.report(&self.config.namespace, log),
        )
        .await;

        match request {
            Ok(Ok(report)) => report,
            Ok(Err(error)) => {
                warn!(
                    event = "report_request_failed",
                    namespace = %self.config.namespace,
                    error = %error,
                    "Report request failed, synthesizing from the action log"
                );
                RawReport::default()
            }
            Err(_) => {
                warn!(
                    event = "report_request_timeout",
                    namespace = %self.config.namespace,
                    "Report request timed out, synthesizing from the action log"
                );
                RawReport::default()
            }
        }
    }
}

/// Ticket body: the decision reason followed by the observed aggregates
fn escalation_body(decision: &Decision, snapshot: &PodSnapshot) -> String {
    let mut body = format!("{}.", decision.reason);
    for metric in RECOGNIZED_METRICS {
        if let Some(aggregate) = snapshot.metrics.get(metric) {
            body.push_str(&format!(
                " {} avg {:.1}, p95 {:.1}.",
                metric, aggregate.avg, aggregate.p95
            ));
        }
    }
    body
}
