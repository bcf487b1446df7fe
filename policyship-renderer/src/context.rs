//! Template context: serializable rendering payload for a run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Per-status counts shown in the summary header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsCtx {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would_publish: usize,
}

/// One table row per artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub artifact: String,
    pub status: String,
    /// Short commit, when known.
    pub commit: Option<String>,
    /// Table-safe detail text (see [`table_cell`]).
    pub detail: String,
}

/// Flat rendering payload for `run_summary.md.tera`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryContext {
    /// `reconciliation` or `dry run`.
    pub mode: String,
    pub release: String,
    pub head: String,
    pub baseline_before: Option<String>,
    pub baseline_after: Option<String>,
    pub advanced: bool,
    pub verdict: String,
    pub counts: CountsCtx,
    pub outcomes: Vec<OutcomeRow>,
    /// Artifacts left pending for the next run.
    pub pending: Vec<String>,
    pub generated_at: String,
}

impl SummaryContext {
    /// Empty context for a run at `head`, stamped with `now`.
    pub fn new(release: &str, head: &str, dry_run: bool, now: DateTime<Utc>) -> Self {
        Self {
            mode: if dry_run { "dry run" } else { "reconciliation" }.to_string(),
            release: release.to_string(),
            head: head.to_string(),
            baseline_before: None,
            baseline_after: None,
            advanced: false,
            verdict: String::new(),
            counts: CountsCtx::default(),
            outcomes: Vec::new(),
            pending: Vec::new(),
            generated_at: now.to_rfc3339(),
        }
    }

    pub(crate) fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

/// Make free text safe for a single Markdown table cell.
pub fn table_cell(text: &str) -> String {
    text.replace('\r', "")
        .replace('|', "\\|")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_cell_escapes_pipes_and_joins_lines() {
        assert_eq!(table_cell("a | b\n\n  c  \r\n"), "a \\| b<br>c");
    }

    #[test]
    fn dry_run_mode_label() {
        let ctx = SummaryContext::new("r1", "abc", true, Utc::now());
        assert_eq!(ctx.mode, "dry run");
    }
}
