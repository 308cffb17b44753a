//! Run report synthesis and reconciliation
//!
//! The upstream text producer writes the report it wants, but the action
//! log decides what actually happened. Reconciliation accepts the upstream
//! summary only when it survives normalization, repair, and schema
//! validation; otherwise a summary is synthesized from the log.

mod reconciler;
mod synthesizer;

pub use reconciler::{reconcile, render_display_text, summary_block, DEFAULT_HEADER};
pub use synthesizer::synthesize;
