//! `policyship plan`: detection and eligibility only.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use policyship_sync::{pipeline, Plan};

use super::RepoArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Revision to plan up to.
    #[arg(long, default_value = "HEAD")]
    pub head: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanJson {
    head: String,
    baseline: Option<String>,
    pending: Vec<PendingJson>,
    skipped: Vec<String>,
}

#[derive(Serialize)]
struct PendingJson {
    id: String,
    latest_commit: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let (root, config) = self.repo.load()?;
        let plan = pipeline::plan_at(&root, &config, &self.head)
            .with_context(|| format!("failed to plan up to '{}'", self.head))?;

        if self.json {
            return print_json(&plan);
        }
        print_text(&plan);
        Ok(())
    }
}

fn print_json(plan: &Plan) -> Result<()> {
    let payload = PlanJson {
        head: plan.head.to_string(),
        baseline: plan.baseline.as_ref().map(ToString::to_string),
        pending: plan
            .pending
            .iter()
            .map(|c| PendingJson {
                id: c.id.to_string(),
                latest_commit: c.latest_commit.to_string(),
            })
            .collect(),
        skipped: plan.skipped.iter().map(|o| o.id.to_string()).collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
    );
    Ok(())
}

fn print_text(plan: &Plan) {
    let baseline = plan
        .baseline
        .as_ref()
        .map(|b| b.short().to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("Plan {} → {}", baseline, plan.head.short());

    if plan.pending.is_empty() && plan.skipped.is_empty() {
        println!("No artifact changes since the baseline.");
        return;
    }
    for change in &plan.pending {
        println!(
            "  {} {} ({})",
            "+".green(),
            change.id,
            change.latest_commit.short()
        );
    }
    for outcome in &plan.skipped {
        println!("  {} {} (already delivered)", "·".bright_black(), outcome.id);
    }
    println!(
        "{} to publish, {} already delivered",
        plan.pending.len(),
        plan.skipped.len()
    );
}
