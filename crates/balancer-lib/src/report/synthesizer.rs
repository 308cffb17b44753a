//! Summary synthesis from the action log

use std::collections::BTreeSet;

use serde_json::json;

use crate::action_log::{ActionLog, ActionLogEntry};
use crate::models::Summary;

/// Build a summary from the action log and the scanned pod list
///
/// Each pod lands in exactly one bucket: the first log entry for a pod wins
/// and pods with no effective entry are reported as skipped healthy.
pub fn synthesize(namespace: &str, log: &ActionLog, scanned: &[String]) -> Summary {
    let mut summary = Summary {
        namespace: namespace.to_string(),
        pods_scanned: scanned.len() as u64,
        ..Default::default()
    };
    let mut accounted: BTreeSet<&str> = BTreeSet::new();

    for entry in log.iter() {
        match entry {
            ActionLogEntry::Rebalanced {
                pod,
                changed_fields,
            } => {
                // A rebalance that changed nothing is not a rebalance.
                if changed_fields.is_empty() || !accounted.insert(pod) {
                    continue;
                }
                summary.pods_rebalanced.push(json!({
                    "pod_name": pod,
                    "changed_fields": changed_fields,
                }));
            }
            ActionLogEntry::Escalated {
                pod,
                reason,
                ticket_url,
            } => {
                if !accounted.insert(pod) {
                    continue;
                }
                summary.pods_escalated.push(json!({
                    "pod_name": pod,
                    "reason": first_sentence(reason),
                    "ticket_url": ticket_url,
                }));
            }
            ActionLogEntry::Skipped { pod, reason } => {
                if !accounted.insert(pod) {
                    continue;
                }
                summary.pods_skipped.push(json!({
                    "pod_name": pod,
                    "reason": reason,
                }));
            }
        }
    }

    for pod in scanned {
        if accounted.insert(pod.as_str()) {
            summary.pods_skipped.push(json!({
                "pod_name": pod,
                "reason": "healthy",
            }));
        }
    }

    summary
}

/// Text up to but excluding the first period
fn first_sentence(reason: &str) -> &str {
    match reason.find('.') {
        Some(index) => &reason[..index],
        None => reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn changed(fields: &[(&str, &str)]) -> BTreeMap<String, String> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_entries_partition_into_buckets() {
        let mut log = ActionLog::new();
        log.record(ActionLogEntry::Rebalanced {
            pod: "checkout-service".to_string(),
            changed_fields: changed(&[("mem_limit", "1.25Gi")]),
        });
        log.record(ActionLogEntry::Escalated {
            pod: "recommendation-service".to_string(),
            reason: "Inconsistent metrics detected. cpu avg 18.0, p95 92.0.".to_string(),
            ticket_url: "https://tickets.test/browse/TEST-1".to_string(),
        });
        log.record(ActionLogEntry::Skipped {
            pod: "auth-service".to_string(),
            reason: "healthy".to_string(),
        });
        let scanned = vec![
            "checkout-service".to_string(),
            "recommendation-service".to_string(),
            "auth-service".to_string(),
        ];

        let summary = synthesize("default", &log, &scanned);

        assert_eq!(summary.namespace, "default");
        assert_eq!(summary.pods_scanned, 3);
        assert_eq!(summary.pods_rebalanced.len(), 1);
        assert_eq!(summary.pods_escalated.len(), 1);
        assert_eq!(summary.pods_skipped.len(), 1);
        assert_eq!(
            summary.pods_rebalanced[0]["changed_fields"]["mem_limit"],
            "1.25Gi"
        );
    }

    #[test]
    fn test_escalation_reason_truncated_to_first_sentence() {
        let mut log = ActionLog::new();
        log.record(ActionLogEntry::Escalated {
            pod: "svc".to_string(),
            reason: "Spikes despite low averages. cpu avg 18.0, p95 92.0.".to_string(),
            ticket_url: "https://tickets.test/browse/TEST-1".to_string(),
        });

        let summary = synthesize("default", &log, &["svc".to_string()]);

        assert_eq!(
            summary.pods_escalated[0]["reason"],
            "Spikes despite low averages"
        );
    }

    #[test]
    fn test_empty_change_set_falls_through_to_healthy() {
        let mut log = ActionLog::new();
        log.record(ActionLogEntry::Rebalanced {
            pod: "svc-a".to_string(),
            changed_fields: BTreeMap::new(),
        });

        let summary = synthesize("default", &log, &["svc-a".to_string()]);

        assert!(summary.pods_rebalanced.is_empty());
        assert_eq!(summary.pods_skipped.len(), 1);
        assert_eq!(summary.pods_skipped[0]["reason"], "healthy");
    }

    #[test]
    fn test_unlogged_pods_reported_as_skipped_healthy() {
        let mut log = ActionLog::new();
        log.record(ActionLogEntry::Rebalanced {
            pod: "svc-a".to_string(),
            changed_fields: changed(&[("cpu_request", "320m")]),
        });
        let scanned = vec!["svc-a".to_string(), "svc-b".to_string()];

        let summary = synthesize("default", &log, &scanned);

        assert_eq!(summary.pods_scanned, 2);
        assert_eq!(summary.pods_rebalanced.len(), 1);
        assert_eq!(summary.pods_skipped.len(), 1);
        assert_eq!(summary.pods_skipped[0]["pod_name"], "svc-b");
    }

    #[test]
    fn test_empty_log_reports_every_pod_skipped() {
        let log = ActionLog::new();
        let scanned = vec!["svc-a".to_string(), "svc-b".to_string()];

        let summary = synthesize("default", &log, &scanned);

        assert!(summary.pods_rebalanced.is_empty());
        assert!(summary.pods_escalated.is_empty());
        assert_eq!(summary.pods_skipped.len(), 2);
    }

    #[test]
    fn test_first_entry_per_pod_wins() {
        let mut log = ActionLog::new();
        log.record(ActionLogEntry::Skipped {
            pod: "svc".to_string(),
            reason: "healthy".to_string(),
        });
        log.record(ActionLogEntry::Escalated {
            pod: "svc".to_string(),
            reason: "late duplicate".to_string(),
            ticket_url: "https://tickets.test/browse/TEST-9".to_string(),
        });

        let summary = synthesize("default", &log, &["svc".to_string()]);

        assert_eq!(summary.pods_skipped.len(), 1);
        assert!(summary.pods_escalated.is_empty());
    }
}
