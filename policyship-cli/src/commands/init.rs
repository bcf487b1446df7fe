//! `policyship init`: config scaffold and optional baseline seeding.

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Args;

use policyship_core::{ledger, Config};
use policyship_detector::{GitHistory, SourceHistory};

use super::RepoArgs;

#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Registry base URL written into the scaffold.
    #[arg(long)]
    pub registry_url: Option<String>,

    /// Mark everything up to this revision as already reconciled.
    #[arg(long, value_name = "REV")]
    pub baseline: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = self.repo.repo_root()?;
        let config_path = self.repo.config_path(&root);

        if config_path.exists() && !self.force {
            println!(
                "· {} already exists (use --force to overwrite)",
                config_path.display()
            );
        } else {
            let config = Config {
                registry_url: self.registry_url.clone(),
                ..Config::default()
            };
            let yaml = serde_yaml::to_string(&config).context("failed to serialize config")?;
            fs::write(&config_path, yaml)
                .with_context(|| format!("failed to write '{}'", config_path.display()))?;
            println!("✓ Wrote {}", config_path.display());
        }

        let (root, config) = self.repo.load()?;
        let ledger_dir = config.ledger_dir_in(&root);

        let Some(rev) = self.baseline else {
            return Ok(());
        };
        let history = GitHistory::new(&root);
        let Some(commit) = history
            .resolve(&rev)
            .with_context(|| format!("failed to resolve '{rev}'"))?
        else {
            bail!("'{rev}' does not name a commit");
        };

        let mut current = ledger::load_at(&ledger_dir)
            .with_context(|| format!("failed to load ledger in '{}'", ledger_dir.display()))?;
        if let Some(existing) = &current.baseline {
            if !self.force {
                bail!(
                    "baseline already set to {}; pass --force to replace it",
                    existing.short()
                );
            }
        }
        current.baseline = Some(commit.clone());
        ledger::save_at(&ledger_dir, &current)
            .with_context(|| format!("failed to write ledger in '{}'", ledger_dir.display()))?;
        println!("✓ Baseline set to {}", commit.short());
        Ok(())
    }
}
