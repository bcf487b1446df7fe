//! Converts a [`RunReport`] into the renderer's Markdown summary context.

use chrono::{DateTime, Utc};

use policyship_renderer::{table_cell, CountsCtx, OutcomeRow, RenderError, Renderer, SummaryContext};

use crate::reconciler::{RunReport, Verdict};

pub fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::TotalSuccess => "total success",
        Verdict::PartialSuccess => "partial success",
    }
}

pub fn summary_context(report: &RunReport, now: DateTime<Utc>) -> SummaryContext {
    let mut ctx = SummaryContext::new(&report.release.0, &report.head.0, report.dry_run, now);
    ctx.baseline_before = report.baseline_before.as_ref().map(|c| c.short().to_string());
    ctx.baseline_after = report.baseline_after.as_ref().map(|c| c.short().to_string());
    ctx.advanced = report.advanced;
    ctx.verdict = verdict_label(report.verdict()).to_string();

    let counts = report.counts();
    ctx.counts = CountsCtx {
        delivered: counts.delivered,
        skipped: counts.skipped,
        failed: counts.failed,
        would_publish: counts.would_publish,
    };
    ctx.outcomes = report
        .outcomes
        .iter()
        .map(|o| {
            let mut detail = o.status.detail();
            for warning in &o.warnings {
                detail.push_str("\nwarning: ");
                detail.push_str(warning);
            }
            OutcomeRow {
                artifact: o.id.to_string(),
                status: o.status.label().to_string(),
                commit: Some(o.latest_commit.short().to_string()),
                detail: table_cell(&detail),
            }
        })
        .collect();
    ctx.pending = report.pending().iter().map(|id| id.to_string()).collect();
    ctx
}

/// Markdown summary for CI step summaries.
pub fn render_markdown(report: &RunReport) -> Result<String, RenderError> {
    Renderer::new()?.render_summary(&summary_context(report, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{ArtifactStatus, RunOutcome};
    use policyship_core::{CommitRef, ReleaseTag};

    fn report() -> RunReport {
        RunReport {
            head: CommitRef::from("c5c5c5c5c5c5c5c5"),
            release: ReleaseTag::from("2026.10.1"),
            baseline_before: Some(CommitRef::from("c1c1c1c1c1c1c1c1")),
            baseline_after: Some(CommitRef::from("c1c1c1c1c1c1c1c1")),
            advanced: false,
            dry_run: false,
            ledger_written: true,
            outcomes: vec![RunOutcome::new(
                "policies/x/v1.0.0".parse().unwrap(),
                CommitRef::from("c4c4c4c4c4c4c4c4"),
                ArtifactStatus::ValidationFailed {
                    errors: vec!["missing | policy.yaml".into()],
                },
            )
            .with_warnings(vec!["slow".into()])],
            duration_ms: 12,
        }
    }

    #[test]
    fn context_carries_counts_pending_and_safe_details() {
        let ctx = summary_context(&report(), Utc::now());
        assert_eq!(ctx.verdict, "partial success");
        assert_eq!(ctx.counts.failed, 1);
        assert_eq!(ctx.pending, vec!["policies/x/v1.0.0"]);
        assert_eq!(ctx.baseline_after.as_deref(), Some("c1c1c1c1"));
        assert_eq!(ctx.outcomes[0].detail, "missing \\| policy.yaml<br>warning: slow");
    }

    #[test]
    fn markdown_lists_artifacts() {
        let markdown = render_markdown(&report()).expect("render");
        assert!(markdown.contains("policies/x/v1.0.0"));
        assert!(markdown.contains("validation-failed"));
    }
}
