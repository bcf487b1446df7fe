//! `policyship reconcile`: one full reconciliation run.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use policyship_sync::summary::{render_markdown, verdict_label};
use policyship_sync::{pipeline, RunOptions, RunReport, StatusCounts, Verdict};

use super::{status_label, RepoArgs};

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Release tag recorded on new delivery records.
    #[arg(long)]
    pub release: String,

    /// Revision to reconcile up to. Must be the checked-out commit, since
    /// artifact content is read from the working copy.
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Worker pool width (overrides config).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip the registry existence probe.
    #[arg(long)]
    pub no_probe: bool,

    /// Registry base URL (overrides config).
    #[arg(long)]
    pub registry_url: Option<String>,

    /// Probe and validate only; publish nothing and leave the ledger as is.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Append a Markdown summary to this file (e.g. $GITHUB_STEP_SUMMARY).
    #[arg(long, value_name = "PATH")]
    pub summary_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReconcileJson<'a> {
    verdict: Verdict,
    counts: StatusCounts,
    #[serde(flatten)]
    report: &'a RunReport,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "artifact")]
    artifact: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "commit")]
    commit: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl ReconcileArgs {
    pub fn run(self) -> Result<()> {
        let (root, mut config) = self.repo.load()?;
        if let Some(url) = self.registry_url.clone() {
            config.registry_url = Some(url);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.no_probe {
            config.probe = false;
        }

        let opts = RunOptions {
            head: self.head.clone(),
            release: self.release.clone().into(),
            workers: config.workers,
            probe: config.probe,
            dry_run: self.dry_run,
            handle_interrupts: true,
        };
        let report = pipeline::run_at(&root, &config, &opts).context("reconciliation failed")?;

        if self.json {
            let payload = ReconcileJson {
                verdict: report.verdict(),
                counts: report.counts(),
                report: &report,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize run JSON")?
            );
        } else {
            print_table(&report);
        }

        if let Some(path) = &self.summary_file {
            let markdown = render_markdown(&report).context("failed to render summary")?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open '{}'", path.display()))?;
            file.write_all(markdown.as_bytes())
                .with_context(|| format!("failed to write '{}'", path.display()))?;
        }

        let pending = report.pending().len();
        if pending > 0 {
            bail!("{pending} artifact(s) remain pending; baseline not advanced");
        }
        Ok(())
    }
}

fn print_table(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let baseline = |b: &Option<policyship_core::CommitRef>| {
        b.as_ref()
            .map(|c| c.short().to_string())
            .unwrap_or_else(|| "none".to_string())
    };
    println!(
        "{prefix}Release {} | head {} | baseline {} → {}",
        report.release,
        report.head.short(),
        baseline(&report.baseline_before),
        baseline(&report.baseline_after),
    );

    if report.outcomes.is_empty() {
        println!("{prefix}No artifact changes since the baseline.");
    } else {
        let rows: Vec<OutcomeRow> = report
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
                    commit: o.latest_commit.short().to_string(),
                    detail,
                }
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        for outcome in report.outcomes.iter().filter(|o| o.status.is_failure()) {
            println!(
                "  {} {}: {}",
                status_label(&outcome.status),
                outcome.id,
                outcome.status.detail()
            );
        }
    }

    let counts = report.counts();
    println!(
        "{prefix}{}: {} delivered, {} skipped, {} failed{}",
        verdict_label(report.verdict()),
        counts.delivered,
        counts.skipped,
        counts.failed,
        if counts.would_publish > 0 {
            format!(", {} would publish", counts.would_publish)
        } else {
            String::new()
        }
    );
}
