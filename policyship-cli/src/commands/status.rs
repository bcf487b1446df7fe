//! `policyship status`: baseline and delivery records.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use policyship_core::{ledger, Ledger};

use super::RepoArgs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson<'a> {
    baseline: Option<String>,
    deliveries: &'a ledger::DeliveryMap,
}

#[derive(Tabled)]
struct DeliveryRow {
    #[tabled(rename = "artifact")]
    artifact: String,
    #[tabled(rename = "release")]
    release: String,
    #[tabled(rename = "delivered")]
    delivered: String,
    #[tabled(rename = "commit")]
    commit: String,
    #[tabled(rename = "note")]
    note: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (root, config) = self.repo.load()?;
        let dir = config.ledger_dir_in(&root);
        let ledger = ledger::load_at(&dir)
            .with_context(|| format!("failed to load ledger in '{}'", dir.display()))?;

        if self.json {
            let payload = StatusJson {
                baseline: ledger.baseline.as_ref().map(ToString::to_string),
                deliveries: &ledger.deliveries,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&ledger);
        Ok(())
    }
}

fn print_table(ledger: &Ledger) {
    match &ledger.baseline {
        Some(baseline) => println!("Baseline: {}", baseline.to_string().bold()),
        None => println!("Baseline: {}", "none (next run scans the whole tree)".yellow()),
    }

    if ledger.deliveries.is_empty() {
        println!("No deliveries recorded.");
        return;
    }

    let rows: Vec<DeliveryRow> = ledger
        .deliveries
        .iter()
        .map(|(id, record)| DeliveryRow {
            artifact: id.to_string(),
            release: record.release.to_string(),
            delivered: record.delivered_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            commit: record
                .commit
                .as_ref()
                .map(|c| c.short().to_string())
                .unwrap_or_default(),
            note: record.note.clone().unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{} deliveries recorded", ledger.deliveries.len());
}
