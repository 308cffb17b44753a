//! Decision classification for pod snapshots
//!
//! Maps one snapshot to exactly one remediation decision using fixed
//! threshold rules evaluated in strict precedence order, with an advisory
//! path for snapshots that carry no usable metrics. The classifier is a
//! total function: missing metrics default to zero and every failure mode
//! degrades to healthy/skip.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Classification, Decision, PodSnapshot, RecommendedAction};
use crate::quantity::normalize_memory_percent;

/// Metric names the threshold rules understand
pub const RECOGNIZED_METRICS: [&str; 3] = ["cpu", "memory", "oom_kills"];

/// Reason attached to overloaded decisions
pub const REASON_OVERLOADED: &str = "Memory usage near limits or frequent OOM events";
/// Reason attached to inconsistent decisions
pub const REASON_INCONSISTENT: &str =
    "Inconsistent metrics detected with large p95 spikes despite low averages";
/// Reason attached to idle decisions
pub const REASON_IDLE: &str = "Sustained low CPU and memory consumption";
/// Reason attached to healthy decisions
pub const REASON_HEALTHY: &str = "healthy";

/// Threshold constants driving the rule-based classification
///
/// Passed explicitly so the classifier stays referentially transparent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    /// OOM-kill average at or above which a pod counts as overloaded
    pub oom_overload: f64,
    /// Memory average above which a pod counts as overloaded
    pub mem_overload_percent: f64,
    /// Average below which a metric counts as low for the inconsistency rule
    pub inconsistent_avg_percent: f64,
    /// p95 above which a metric counts as spiking for the inconsistency rule
    pub inconsistent_p95_percent: f64,
    /// CPU and memory average below which a pod counts as idle
    pub idle_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            oom_overload: 3.0,
            mem_overload_percent: 90.0,
            inconsistent_avg_percent: 30.0,
            inconsistent_p95_percent: 80.0,
            idle_percent: 20.0,
        }
    }
}

/// Unverified classification triple suggested by the upstream text producer
///
/// Consulted only for snapshots without metrics, and only after validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdvisoryCandidate {
    pub classification: String,
    pub recommended_action: String,
    pub reason: String,
}

impl AdvisoryCandidate {
    /// Pull a candidate out of parsed advisory JSON
    ///
    /// All three fields must be present as strings; enum validity is checked
    /// at resolution time.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Accept the candidate as a decision
    ///
    /// Both enum fields must parse and the action must match the
    /// classification's fixed pairing; anything else is rejected.
    fn validate(&self, pod: &str) -> Option<Decision> {
        let classification: Classification =
            serde_json::from_value(Value::String(self.classification.clone())).ok()?;
        let action: RecommendedAction =
            serde_json::from_value(Value::String(self.recommended_action.clone())).ok()?;
        if action != classification.action() {
            return None;
        }
        Some(Decision {
            pod: pod.to_string(),
            classification,
            action,
            reason: self.reason.clone(),
        })
    }
}

/// Classification outcome before precedence resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Numeric thresholds matched; policy-owned result
    RuleBased(Decision),
    /// No usable metrics; an external advisory is on offer
    Advisory(AdvisoryCandidate),
    /// No usable metrics and no advisory
    Default,
}

/// Classify a snapshot into exactly one remediation decision
pub fn classify(
    snapshot: &PodSnapshot,
    advisory: Option<&Value>,
    thresholds: &Thresholds,
) -> Decision {
    resolve(&snapshot.name, evaluate(snapshot, advisory, thresholds))
}

/// Evaluate the snapshot into an outcome without resolving it
///
/// The threshold rules apply whenever the snapshot carries at least one
/// recognized metric; the advisory is considered only when it carries none.
pub fn evaluate(
    snapshot: &PodSnapshot,
    advisory: Option<&Value>,
    thresholds: &Thresholds,
) -> Outcome {
    let view = MetricView::from_snapshot(snapshot);

    if !view.has_metrics {
        return match advisory.and_then(AdvisoryCandidate::from_value) {
            Some(candidate) => Outcome::Advisory(candidate),
            None => Outcome::Default,
        };
    }

    let overloaded = view.oom_avg >= thresholds.oom_overload
        || view.mem_avg > thresholds.mem_overload_percent;
    let inconsistent = (view.cpu_avg < thresholds.inconsistent_avg_percent
        && view.cpu_p95 > thresholds.inconsistent_p95_percent)
        || (view.mem_avg < thresholds.inconsistent_avg_percent
            && view.mem_p95 > thresholds.inconsistent_p95_percent);
    let idle = view.cpu_avg < thresholds.idle_percent && view.mem_avg < thresholds.idle_percent;

    // First match wins; the ordering is policy, not an accident.
    let (classification, reason) = if overloaded {
        (Classification::Overloaded, REASON_OVERLOADED)
    } else if inconsistent {
        (Classification::Inconsistent, REASON_INCONSISTENT)
    } else if idle {
        (Classification::Idle, REASON_IDLE)
    } else {
        (Classification::Healthy, REASON_HEALTHY)
    };

    Outcome::RuleBased(decision_for(&snapshot.name, classification, reason))
}

/// Resolve an outcome into the final decision
///
/// Rule-based results pass through, advisories are validated and otherwise
/// discarded, and everything else defaults to healthy/skip.
pub fn resolve(pod: &str, outcome: Outcome) -> Decision {
    match outcome {
        Outcome::RuleBased(decision) => decision,
        Outcome::Advisory(candidate) => candidate
            .validate(pod)
            .unwrap_or_else(|| decision_for(pod, Classification::Healthy, REASON_HEALTHY)),
        Outcome::Default => decision_for(pod, Classification::Healthy, REASON_HEALTHY),
    }
}

fn decision_for(pod: &str, classification: Classification, reason: &str) -> Decision {
    Decision {
        pod: pod.to_string(),
        classification,
        action: classification.action(),
        reason: reason.to_string(),
    }
}

/// Flattened metric values with absent metrics defaulted to zero
struct MetricView {
    cpu_avg: f64,
    cpu_p95: f64,
    mem_avg: f64,
    mem_p95: f64,
    oom_avg: f64,
    has_metrics: bool,
}

impl MetricView {
    fn from_snapshot(snapshot: &PodSnapshot) -> Self {
        let cpu = snapshot.metrics.get("cpu");
        let memory = snapshot.metrics.get("memory");
        let oom = snapshot.metrics.get("oom_kills");
        let mem_limit = snapshot.spec.mem_limit.as_deref();

        Self {
            cpu_avg: cpu.map(|m| m.avg).unwrap_or(0.0),
            cpu_p95: cpu.map(|m| m.p95).unwrap_or(0.0),
            mem_avg: normalize_memory_percent(memory.map(|m| m.avg).unwrap_or(0.0), mem_limit),
            mem_p95: normalize_memory_percent(memory.map(|m| m.p95).unwrap_or(0.0), mem_limit),
            oom_avg: oom.map(|m| m.avg).unwrap_or(0.0),
            has_metrics: cpu.is_some() || memory.is_some() || oom.is_some(),
        }
    }
}
