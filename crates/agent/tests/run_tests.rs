//! Integration tests for full rebalancing runs over the fixture scenarios

use std::collections::BTreeMap;
use std::sync::Arc;

use balancer_lib::action_log::ActionLog;
use balancer_lib::clients::{async_trait, TextProducer};
use balancer_lib::fixtures::{
    full_scenario, healthy_scenario, idle_scenario, inconsistent_scenario, oom_killed_scenario,
    FixtureCluster, FixtureNotifier, FixtureTickets, ScenarioFixtures, ScriptedProducer,
};
use balancer_lib::models::{MetricAggregate, PodSnapshot, Provenance, RawReport, ResourceSpec};
use balancer_lib::orchestrator::{Orchestrator, RunConfig, DEFAULT_METRICS_WINDOW};
use balancer_lib::report::DEFAULT_HEADER;

fn orchestrator(fixtures: &ScenarioFixtures, config: RunConfig) -> Orchestrator {
    Orchestrator::new(
        fixtures.cluster.clone(),
        fixtures.tickets.clone(),
        fixtures.notifier.clone(),
        fixtures.producer.clone(),
        config,
    )
}

/// Parse the fenced JSON block out of a posted message
fn fenced_json(text: &str) -> serde_json::Value {
    let block = text.split("```").nth(1).expect("no fenced block in text");
    let payload = block.trim().strip_prefix("json").unwrap_or(block).trim();
    serde_json::from_str(payload).expect("fenced block is not valid JSON")
}

#[tokio::test]
async fn test_full_scenario_rebalances_namespace() {
    let fixtures = full_scenario();
    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    // Two pods change: the overloaded one and the idle one.
    let updates = fixtures.cluster.updates().await;
    assert_eq!(updates.len(), 2);

    let checkout = &updates[0];
    assert_eq!(checkout.pod, "checkout-service");
    assert_eq!(checkout.changes.mem_limit.as_deref(), Some("1.25Gi"));
    assert!(checkout.changes.cpu_request.is_none());
    assert!(checkout.changes.cpu_limit.is_none());
    assert!(checkout.changes.mem_request.is_none());

    let idle = &updates[1];
    assert_eq!(idle.pod, "idle-service");
    assert_eq!(idle.changes.cpu_request.as_deref(), Some("320m"));
    assert_eq!(idle.changes.mem_request.as_deref(), Some("409.6Mi"));
    assert!(idle.changes.cpu_limit.is_none());
    assert!(idle.changes.mem_limit.is_none());

    // One escalation ticket for the inconsistent pod.
    let tickets = fixtures.tickets.tickets().await;
    assert_eq!(tickets.len(), 1);
    assert!(tickets[0].title.contains("recommendation-service"));
    assert_eq!(tickets[0].url, "https://tickets.test/browse/TEST-1");

    // One posted message carrying the report and the ticket link.
    let messages = fixtures.notifier.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, "#platform-notifications");
    assert!(messages[0].text.starts_with(DEFAULT_HEADER));
    assert!(messages[0].text.contains(&tickets[0].url));
    assert!(messages[0]
        .payload
        .as_deref()
        .unwrap()
        .contains("pods_scanned"));

    // The scripted producer never returns a fenced summary, so the
    // report is synthesized from the action log.
    assert_eq!(outcome.provenance, Provenance::Synthesized);

    let summary = &outcome.summary;
    assert_eq!(summary.namespace, "default");
    assert_eq!(summary.pods_scanned, 4);
    assert_eq!(summary.pods_rebalanced.len(), 2);
    assert_eq!(summary.pods_escalated.len(), 1);
    assert_eq!(summary.pods_skipped.len(), 1);

    let escalated = &summary.pods_escalated[0];
    assert_eq!(escalated["pod_name"], "recommendation-service");
    assert_eq!(escalated["ticket_url"], tickets[0].url.as_str());
    assert_eq!(
        escalated["reason"],
        "Inconsistent metrics detected with large p95 spikes despite low averages"
    );

    let skipped = &summary.pods_skipped[0];
    assert_eq!(skipped["pod_name"], "auth-service");
    assert_eq!(skipped["reason"], "healthy");

    // The posted text embeds the same summary it reports.
    let embedded = fenced_json(&outcome.display_text);
    assert_eq!(embedded, serde_json::to_value(summary).unwrap());
}

#[tokio::test]
async fn test_schema_valid_report_accepted_verbatim() {
    let mut cluster = FixtureCluster::new();
    cluster.add_namespace("default", &["svc-a"]);
    cluster.set_spec("svc-a", ResourceSpec::default());
    cluster.set_metric(
        "svc-a",
        "cpu",
        DEFAULT_METRICS_WINDOW,
        MetricAggregate { avg: 45.0, p95: 55.0 },
    );
    cluster.set_metric(
        "svc-a",
        "memory",
        DEFAULT_METRICS_WINDOW,
        MetricAggregate { avg: 48.0, p95: 60.0 },
    );

    // Trailing comma before the closing brace; repair must recover it.
    let report_text = concat!(
        "Here is the run summary\n",
        "```json\n",
        "{\"namespace\": \"default\", \"pods_scanned\": 7, ",
        "\"pods_rebalanced\": [], \"pods_escalated\": [], \"pods_skipped\": [],}\n",
        "```",
    );
    let mut responses = BTreeMap::new();
    responses.insert("report default".to_string(), report_text.to_string());

    let fixtures = ScenarioFixtures {
        cluster: Arc::new(cluster),
        tickets: Arc::new(FixtureTickets::default()),
        notifier: Arc::new(FixtureNotifier::new()),
        producer: Arc::new(ScriptedProducer::new(responses)),
    };

    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    // Accepted on schema alone, even though the counts disagree with
    // what actually happened.
    assert_eq!(outcome.provenance, Provenance::Upstream);
    assert_eq!(outcome.summary.pods_scanned, 7);
    assert!(outcome.display_text.starts_with("Here is the run summary"));
}

#[tokio::test]
async fn test_failing_producer_still_posts_synthesized_report() {
    struct FailingProducer;

    #[async_trait]
    impl TextProducer for FailingProducer {
        async fn advise(&self, _snapshot: &PodSnapshot) -> anyhow::Result<String> {
            anyhow::bail!("producer unavailable")
        }

        async fn report(&self, _namespace: &str, _log: &ActionLog) -> anyhow::Result<RawReport> {
            anyhow::bail!("producer unavailable")
        }
    }

    let base = healthy_scenario();
    let fixtures = ScenarioFixtures {
        cluster: base.cluster.clone(),
        tickets: base.tickets.clone(),
        notifier: base.notifier.clone(),
        producer: Arc::new(FailingProducer),
    };

    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.provenance, Provenance::Synthesized);
    assert_eq!(outcome.summary.pods_scanned, 1);
    assert_eq!(fixtures.notifier.messages().await.len(), 1);
}

#[tokio::test]
async fn test_oom_killed_scenario_raises_memory_limit_only() {
    let fixtures = oom_killed_scenario();
    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    let updates = fixtures.cluster.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].pod, "checkout-service");
    assert_eq!(updates[0].changes.mem_limit.as_deref(), Some("1.25Gi"));
    assert!(updates[0].changes.cpu_request.is_none());
    assert!(updates[0].changes.mem_request.is_none());
    assert_eq!(outcome.summary.pods_rebalanced.len(), 1);
    assert!(fixtures.tickets.tickets().await.is_empty());
}

#[tokio::test]
async fn test_idle_scenario_shrinks_requests() {
    let fixtures = idle_scenario();
    orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    let updates = fixtures.cluster.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].pod, "idle-service");
    assert_eq!(updates[0].changes.cpu_request.as_deref(), Some("320m"));
    assert_eq!(updates[0].changes.mem_request.as_deref(), Some("409.6Mi"));
    assert!(updates[0].changes.mem_limit.is_none());
}

#[tokio::test]
async fn test_inconsistent_scenario_escalates() {
    let fixtures = inconsistent_scenario();
    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    assert!(fixtures.cluster.updates().await.is_empty());
    let tickets = fixtures.tickets.tickets().await;
    assert_eq!(tickets.len(), 1);
    assert_eq!(
        tickets[0].title,
        "Inconsistent metrics for recommendation-service in default"
    );
    assert_eq!(outcome.summary.pods_escalated.len(), 1);
}

#[tokio::test]
async fn test_healthy_scenario_leaves_pod_alone() {
    let fixtures = healthy_scenario();
    let outcome = orchestrator(&fixtures, RunConfig::default())
        .run()
        .await
        .unwrap();

    assert!(fixtures.cluster.updates().await.is_empty());
    assert!(fixtures.tickets.tickets().await.is_empty());
    assert_eq!(outcome.summary.pods_skipped.len(), 1);
    assert_eq!(outcome.summary.pods_skipped[0]["pod_name"], "auth-service");
    assert_eq!(outcome.summary.pods_skipped[0]["reason"], "healthy");
}

#[tokio::test]
async fn test_channel_override_is_respected() {
    let fixtures = healthy_scenario();
    let config = RunConfig {
        channel: "#ops-alerts".to_string(),
        ..RunConfig::default()
    };

    orchestrator(&fixtures, config).run().await.unwrap();

    let messages = fixtures.notifier.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel, "#ops-alerts");
}
