//! In-memory client fixtures for demos and tests
//!
//! Deterministic stand-ins for the cluster, ticket tracker, notifier, and
//! text producer, plus the canned scenarios the agent binary can replay.
//! Every fixture records what was asked of it so tests can assert on the
//! calls after a run.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tokio::sync::Mutex;

use crate::action_log::ActionLog;
use crate::clients::{
    async_trait, ClusterClient, Notifier, ResourceChanges, TextProducer, Ticket, TicketSink,
};
use crate::models::{MetricAggregate, PodSnapshot, RawReport, ResourceSpec};
use crate::orchestrator::DEFAULT_METRICS_WINDOW;

/// Scripted response used when no other key matches
pub const DEFAULT_RESPONSE_KEY: &str = "__default__";

/// One `update_resources` call as the cluster fixture saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub pod: String,
    pub changes: ResourceChanges,
}

/// One posted notification
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMessage {
    pub channel: String,
    pub text: String,
    pub payload: Option<String>,
}

/// One created ticket
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTicket {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Cluster fixture backed by in-memory maps
#[derive(Debug, Default)]
pub struct FixtureCluster {
    pods: BTreeMap<String, Vec<String>>,
    specs: BTreeMap<String, ResourceSpec>,
    metrics: BTreeMap<(String, String, String), MetricAggregate>,
    updates: Mutex<Vec<RecordedUpdate>>,
}

impl FixtureCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self, namespace: &str, pods: &[&str]) {
        self.pods.insert(
            namespace.to_string(),
            pods.iter().map(|pod| pod.to_string()).collect(),
        );
    }

    pub fn set_spec(&mut self, pod: &str, spec: ResourceSpec) {
        self.specs.insert(pod.to_string(), spec);
    }

    pub fn set_metric(&mut self, pod: &str, metric: &str, window: &str, aggregate: MetricAggregate) {
        self.metrics.insert(
            (pod.to_string(), metric.to_string(), window.to_string()),
            aggregate,
        );
    }

    /// Updates applied so far, in call order
    pub async fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl ClusterClient for FixtureCluster {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        self.pods
            .get(namespace)
            .cloned()
            .ok_or_else(|| anyhow!("unknown namespace {namespace}"))
    }

    async fn describe_pod(&self, pod: &str) -> Result<ResourceSpec> {
        self.specs
            .get(pod)
            .cloned()
            .ok_or_else(|| anyhow!("missing description for {pod}"))
    }

    async fn query_metrics(
        &self,
        pod: &str,
        metric: &str,
        window: &str,
    ) -> Result<Option<MetricAggregate>> {
        Ok(self
            .metrics
            .get(&(pod.to_string(), metric.to_string(), window.to_string()))
            .copied())
    }

    async fn update_resources(&self, pod: &str, changes: &ResourceChanges) -> Result<()> {
        self.updates.lock().await.push(RecordedUpdate {
            pod: pod.to_string(),
            changes: changes.clone(),
        });
        Ok(())
    }
}

/// Ticket fixture that mints sequential ids under one project key
#[derive(Debug)]
pub struct FixtureTickets {
    project: String,
    tickets: Mutex<Vec<RecordedTicket>>,
}

impl FixtureTickets {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            tickets: Mutex::new(Vec::new()),
        }
    }

    pub async fn tickets(&self) -> Vec<RecordedTicket> {
        self.tickets.lock().await.clone()
    }
}

impl Default for FixtureTickets {
    fn default() -> Self {
        Self::new("TEST")
    }
}

#[async_trait]
impl TicketSink for FixtureTickets {
    async fn create_ticket(&self, title: &str, body: &str) -> Result<Ticket> {
        let mut tickets = self.tickets.lock().await;
        let id = format!("{}-{}", self.project, tickets.len() + 1);
        let url = format!("https://tickets.test/browse/{id}");
        tickets.push(RecordedTicket {
            title: title.to_string(),
            body: body.to_string(),
            url: url.clone(),
        });
        Ok(Ticket { id, url })
    }
}

/// Notifier fixture that keeps every posted message
#[derive(Debug, Default)]
pub struct FixtureNotifier {
    messages: Mutex<Vec<RecordedMessage>>,
}

impl FixtureNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for FixtureNotifier {
    async fn post_message(&self, channel: &str, text: &str, payload: Option<&str>) -> Result<()> {
        self.messages.lock().await.push(RecordedMessage {
            channel: channel.to_string(),
            text: text.to_string(),
            payload: payload.map(str::to_string),
        });
        Ok(())
    }
}

/// Deterministic text producer driven by a key-to-response table
///
/// The first non-default key contained in the request context wins;
/// `__default__` answers anything else.
#[derive(Debug, Default)]
pub struct ScriptedProducer {
    responses: BTreeMap<String, String>,
}

impl ScriptedProducer {
    pub fn new(responses: BTreeMap<String, String>) -> Self {
        Self { responses }
    }

    fn respond(&self, context: &str) -> Result<String> {
        for (key, value) in &self.responses {
            if key != DEFAULT_RESPONSE_KEY && context.contains(key.as_str()) {
                return Ok(value.clone());
            }
        }
        self.responses
            .get(DEFAULT_RESPONSE_KEY)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted response for context: {context}"))
    }
}

#[async_trait]
impl TextProducer for ScriptedProducer {
    async fn advise(&self, snapshot: &PodSnapshot) -> Result<String> {
        self.respond(&snapshot.name)
    }

    async fn report(&self, namespace: &str, log: &ActionLog) -> Result<RawReport> {
        let log_json = serde_json::to_string(log).unwrap_or_default();
        let context = format!("report {namespace} {log_json}");
        Ok(RawReport::from_text(self.respond(&context)?))
    }
}

/// Shared handles to one scenario's fixture set
#[derive(Clone)]
pub struct ScenarioFixtures {
    pub cluster: Arc<FixtureCluster>,
    pub tickets: Arc<FixtureTickets>,
    pub notifier: Arc<FixtureNotifier>,
    pub producer: Arc<dyn TextProducer>,
}

/// Four-pod namespace exercising every classification at once
pub fn full_scenario() -> ScenarioFixtures {
    let mut cluster = FixtureCluster::new();
    cluster.add_namespace(
        "default",
        &[
            "checkout-service",
            "idle-service",
            "recommendation-service",
            "auth-service",
        ],
    );
    cluster.set_spec("checkout-service", spec("500m", "750m", "512Mi", "1Gi"));
    cluster.set_spec("idle-service", spec("400m", "500m", "512Mi", "1Gi"));
    cluster.set_spec("recommendation-service", spec("600m", "900m", "1Gi", "2Gi"));
    cluster.set_spec("auth-service", spec("300m", "600m", "512Mi", "1Gi"));

    let window = DEFAULT_METRICS_WINDOW;
    cluster.set_metric("checkout-service", "cpu", window, aggregate(65.0, 80.0));
    cluster.set_metric("checkout-service", "memory", window, aggregate(95.0, 98.0));
    cluster.set_metric("checkout-service", "oom_kills", window, aggregate(4.0, 4.0));
    cluster.set_metric("idle-service", "cpu", window, aggregate(10.0, 18.0));
    cluster.set_metric("idle-service", "memory", window, aggregate(12.0, 19.0));
    cluster.set_metric("recommendation-service", "cpu", window, aggregate(18.0, 92.0));
    cluster.set_metric("recommendation-service", "memory", window, aggregate(15.0, 93.0));
    cluster.set_metric("auth-service", "cpu", window, aggregate(42.0, 55.0));
    cluster.set_metric("auth-service", "memory", window, aggregate(47.0, 58.0));

    assemble(cluster)
}

/// Single pod with memory pressure and OOM kills
pub fn oom_killed_scenario() -> ScenarioFixtures {
    single_pod_scenario(
        "checkout-service",
        spec("500m", "750m", "512Mi", "1Gi"),
        aggregate(40.0, 60.0),
        aggregate(95.0, 99.0),
        aggregate(4.0, 4.0),
    )
}

/// Single pod with sustained low utilization
pub fn idle_scenario() -> ScenarioFixtures {
    single_pod_scenario(
        "idle-service",
        spec("400m", "500m", "512Mi", "1Gi"),
        aggregate(10.0, 18.0),
        aggregate(12.0, 19.0),
        aggregate(0.0, 0.0),
    )
}

/// Single pod with p95 spikes over low averages
pub fn inconsistent_scenario() -> ScenarioFixtures {
    single_pod_scenario(
        "recommendation-service",
        spec("600m", "900m", "1Gi", "2Gi"),
        aggregate(18.0, 92.0),
        aggregate(15.0, 93.0),
        aggregate(0.0, 0.0),
    )
}

/// Single pod with balanced utilization
pub fn healthy_scenario() -> ScenarioFixtures {
    single_pod_scenario(
        "auth-service",
        spec("300m", "600m", "512Mi", "1Gi"),
        aggregate(45.0, 55.0),
        aggregate(48.0, 60.0),
        aggregate(0.0, 0.0),
    )
}

fn single_pod_scenario(
    pod: &str,
    pod_spec: ResourceSpec,
    cpu: MetricAggregate,
    memory: MetricAggregate,
    oom: MetricAggregate,
) -> ScenarioFixtures {
    let mut cluster = FixtureCluster::new();
    cluster.add_namespace("default", &[pod]);
    cluster.set_spec(pod, pod_spec);
    cluster.set_metric(pod, "cpu", DEFAULT_METRICS_WINDOW, cpu);
    cluster.set_metric(pod, "memory", DEFAULT_METRICS_WINDOW, memory);
    cluster.set_metric(pod, "oom_kills", DEFAULT_METRICS_WINDOW, oom);
    assemble(cluster)
}

fn assemble(cluster: FixtureCluster) -> ScenarioFixtures {
    ScenarioFixtures {
        cluster: Arc::new(cluster),
        tickets: Arc::new(FixtureTickets::default()),
        notifier: Arc::new(FixtureNotifier::new()),
        producer: Arc::new(ScriptedProducer::new(scripted_responses())),
    }
}

/// Advisory responses keyed by pod name, mirroring what a cooperative
/// producer would answer for each canned pod
pub fn scripted_responses() -> BTreeMap<String, String> {
    let entries = [
        (
            "checkout-service",
            json!({
                "classification": "overloaded",
                "recommended_action": "increase_memory_limit",
                "reason": "Memory pressure and OOM events observed",
            }),
        ),
        (
            "idle-service",
            json!({
                "classification": "idle",
                "recommended_action": "decrease_requests",
                "reason": "Sustained low CPU and memory usage",
            }),
        ),
        (
            "recommendation-service",
            json!({
                "classification": "inconsistent",
                "recommended_action": "escalate_inconsistent",
                "reason": "High percentiles despite low averages",
            }),
        ),
        (
            "auth-service",
            json!({
                "classification": "healthy",
                "recommended_action": "skip",
                "reason": "Balanced utilisation",
            }),
        ),
        (DEFAULT_RESPONSE_KEY, json!({"notice": "prompt not recognised"})),
    ];

    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn spec(cpu_request: &str, cpu_limit: &str, mem_request: &str, mem_limit: &str) -> ResourceSpec {
    ResourceSpec {
        cpu_request: Some(cpu_request.to_string()),
        cpu_limit: Some(cpu_limit.to_string()),
        mem_request: Some(mem_request.to_string()),
        mem_limit: Some(mem_limit.to_string()),
    }
}

fn aggregate(avg: f64, p95: f64) -> MetricAggregate {
    MetricAggregate { avg, p95 }
}
