//! Upstream report reconciliation
//!
//! Normalizes the raw report into display text, then tries to recover a
//! schema-valid summary from its fenced payload. Recovery tolerates a
//! language tag after the opening fence and trailing commas before
//! closers; anything worse rejects the payload and the summary is
//! synthesized from the action log instead.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::action_log::ActionLog;
use crate::models::{Provenance, RawReport, ReconciledReport, Summary};

use super::synthesizer::synthesize;

/// Header used when the upstream report supplies none
pub const DEFAULT_HEADER: &str = "✅ Resource Rebalance Completed";

const FENCE: &str = "```";
const LANGUAGE_TAG: &str = "json";

/// Trailing comma immediately before a closing bracket or brace
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]\}])").unwrap());

/// Reconcile the upstream report against the action log
///
/// The upstream summary is accepted only when its fenced payload parses
/// (after repair) into the full summary schema. On rejection the summary
/// and the display text are both rebuilt from the log, so the two never
/// disagree about what happened.
pub fn reconcile(
    report: &RawReport,
    log: &ActionLog,
    namespace: &str,
    scanned: &[String],
) -> ReconciledReport {
    let display_text = normalize_display(report);

    let accepted = extract_fenced_block(&display_text)
        .map(|block| strip_language_tag(block.trim()))
        .and_then(parse_with_repair)
        .and_then(validate_summary);

    match accepted {
        Some(summary) => ReconciledReport {
            summary,
            display_text,
            provenance: Provenance::Upstream,
        },
        None => {
            let summary = synthesize(namespace, log, scanned);
            let display_text = render_display_text(&summary, &log.ticket_urls());
            ReconciledReport {
                summary,
                display_text,
                provenance: Provenance::Synthesized,
            }
        }
    }
}

/// Render the canonical display text for a summary
pub fn render_display_text(summary: &Summary, ticket_urls: &[&str]) -> String {
    let mut text = format!("{DEFAULT_HEADER}\n{}", summary_block(summary));
    for url in ticket_urls {
        text.push('\n');
        text.push_str(url);
    }
    text
}

/// Fence a summary as a pretty-printed JSON block
pub fn summary_block(summary: &Summary) -> String {
    let rendered =
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
    format!("{FENCE}{LANGUAGE_TAG}\n{rendered}\n{FENCE}")
}

/// Normalize the raw report into displayable text
///
/// A report with a payload gets the payload re-fenced under the text (or
/// under the default header when the text is empty); text that already
/// carries its own fence is kept untouched. A report without a payload is
/// just its trimmed text.
fn normalize_display(report: &RawReport) -> String {
    let text = report.text.trim();
    let payload = report
        .payload
        .as_deref()
        .filter(|payload| !payload.is_empty());

    match payload {
        Some(block) => {
            let normalized = normalize_code_block(block);
            let header = if text.is_empty() { DEFAULT_HEADER } else { text };
            if header.contains(FENCE) {
                header.to_string()
            } else {
                format!("{header}\n{normalized}")
            }
        }
        None => text.to_string(),
    }
}

/// Re-fence a payload block as canonical pretty JSON
///
/// When the block carries fences of its own, only the last non-blank
/// segment is considered. Unrecoverable payloads collapse to an empty
/// JSON object rather than leaking malformed text into the display.
fn normalize_code_block(block: &str) -> String {
    let content = if block.contains(FENCE) {
        block
            .split(FENCE)
            .filter(|segment| !segment.trim().is_empty())
            .last()
            .unwrap_or("")
    } else {
        block
    };

    let payload = strip_language_tag(content.trim());
    let rendered = match parse_with_repair(payload) {
        Some(value) => pretty_json(&value),
        None => "{}".to_string(),
    };
    format!("{FENCE}{LANGUAGE_TAG}\n{rendered}\n{FENCE}")
}

/// Content between the first pair of fences, if any
fn extract_fenced_block(text: &str) -> Option<&str> {
    let mut segments = text.split(FENCE);
    segments.next()?;
    segments.next()
}

/// Drop a leading `json` language tag left over from the fence
fn strip_language_tag(block: &str) -> &str {
    match block.get(..LANGUAGE_TAG.len()) {
        Some(tag) if tag.eq_ignore_ascii_case(LANGUAGE_TAG) => {
            block[LANGUAGE_TAG.len()..].trim_start()
        }
        _ => block,
    }
}

/// Parse JSON, retrying once after trailing-comma repair
fn parse_with_repair(payload: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(payload) {
        return Some(value);
    }
    serde_json::from_str(&strip_trailing_commas(payload)).ok()
}

/// Remove trailing commas before closers, iterating to a fixed point
fn strip_trailing_commas(payload: &str) -> String {
    let mut current = payload.to_string();
    loop {
        let next = TRAILING_COMMA_RE.replace_all(&current, "$1").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Accept the payload only if it is a full summary object
fn validate_summary(value: Value) -> Option<Summary> {
    serde_json::from_value(value).ok()
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
