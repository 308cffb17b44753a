//! Rebalance Agent - Namespace resource rebalancing agent
//!
//! This binary replays one rebalancing pass over a canned fixture
//! scenario: it snapshots every pod in the namespace, classifies each one
//! against the threshold rules, applies the paired actions, and posts the
//! reconciled run report.

use anyhow::Result;
use balancer_lib::fixtures::{self, ScenarioFixtures};
use balancer_lib::orchestrator::Orchestrator;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Namespace Rebalance Agent
#[derive(Parser)]
#[command(name = "rebalance-agent")]
#[command(author, version, about = "Namespace resource rebalancing agent", long_about = None)]
struct Cli {
    /// Fixture scenario to replay
    #[arg(long, value_enum, env = "REBALANCER_SCENARIO", default_value_t = Scenario::Full)]
    scenario: Scenario,

    /// Namespace to rebalance (overrides REBALANCER_NAMESPACE)
    #[arg(long)]
    namespace: Option<String>,

    /// Channel the report is posted to (overrides REBALANCER_CHANNEL)
    #[arg(long)]
    channel: Option<String>,
}

/// Canned fixture scenarios
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Scenario {
    /// Four pods covering every classification
    #[default]
    Full,
    /// Single pod with memory pressure and OOM kills
    OomKilled,
    /// Single pod with sustained low utilization
    Idle,
    /// Single pod with p95 spikes over low averages
    Inconsistent,
    /// Single pod with balanced utilization
    Healthy,
}

impl Scenario {
    fn fixtures(self) -> ScenarioFixtures {
        match self {
            Scenario::Full => fixtures::full_scenario(),
            Scenario::OomKilled => fixtures::oom_killed_scenario(),
            Scenario::Idle => fixtures::idle_scenario(),
            Scenario::Inconsistent => fixtures::inconsistent_scenario(),
            Scenario::Healthy => fixtures::healthy_scenario(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rebalance-agent");

    // Load configuration
    let mut agent_config = config::AgentConfig::load()?;
    if let Some(namespace) = cli.namespace {
        agent_config.namespace = namespace;
    }
    if let Some(channel) = cli.channel {
        agent_config.channel = channel;
    }
    info!(
        namespace = %agent_config.namespace,
        scenario = ?cli.scenario,
        "Agent configured"
    );

    let scenario = cli.scenario.fixtures();
    let orchestrator = Orchestrator::new(
        scenario.cluster.clone(),
        scenario.tickets.clone(),
        scenario.notifier.clone(),
        scenario.producer.clone(),
        agent_config.run_config(),
    );

    let outcome = orchestrator.run().await?;

    info!(
        pods_scanned = outcome.summary.pods_scanned,
        provenance = %outcome.provenance,
        "Run finished"
    );
    println!("{}", outcome.display_text);

    Ok(())
}
