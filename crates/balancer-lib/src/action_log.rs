//! Append-only record of per-pod actions taken during a run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One recorded action
///
/// Escalated entries keep the full ticket body; consumers that need the
/// short form truncate at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionLogEntry {
    Rebalanced {
        pod: String,
        changed_fields: BTreeMap<String, String>,
    },
    Escalated {
        pod: String,
        reason: String,
        ticket_url: String,
    },
    Skipped {
        pod: String,
        reason: String,
    },
}

impl ActionLogEntry {
    pub fn pod(&self) -> &str {
        match self {
            Self::Rebalanced { pod, .. } => pod,
            Self::Escalated { pod, .. } => pod,
            Self::Skipped { pod, .. } => pod,
        }
    }
}

/// Ordered log of everything a run did, the source of truth for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    entries: Vec<ActionLogEntry>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ActionLogEntry) {
        self.entries.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ticket URLs from escalation entries, in log order
    pub fn ticket_urls(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ActionLogEntry::Escalated { ticket_url, .. } => Some(ticket_url.as_str()),
                _ => None,
            })
            .collect()
    }
}
