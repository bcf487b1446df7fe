//! Subcommands and the repository/config arguments they share.

pub mod init;
pub mod plan;
pub mod reconcile;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};

use policyship_core::{config, Config};
use policyship_sync::ArtifactStatus;

/// `--repo` / `--config`, flattened into every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// Repository root holding the collections and the ledger.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Config file (default: <repo>/.policyship.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RepoArgs {
    pub fn repo_root(&self) -> Result<PathBuf> {
        self.repo
            .canonicalize()
            .with_context(|| format!("cannot resolve repository path '{}'", self.repo.display()))
    }

    pub fn config_path(&self, repo_root: &std::path::Path) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| config::config_path_at(repo_root))
    }

    /// Canonical repo root and its configuration.
    pub fn load(&self) -> Result<(PathBuf, Config)> {
        let root = self.repo_root()?;
        let path = self.config_path(&root);
        let config = config::load_from(&path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?;
        tracing::debug!(repo = %root.display(), config = %path.display(), "configuration loaded");
        Ok((root, config))
    }
}

/// Status label for terminal output.
pub fn status_label(status: &ArtifactStatus) -> ColoredString {
    let label = status.label();
    match status {
        ArtifactStatus::Delivered { .. } => label.green(),
        ArtifactStatus::Skipped {
            modified_after_delivery: true,
        } => label.yellow(),
        ArtifactStatus::Skipped { .. } => label.bright_black(),
        ArtifactStatus::WouldPublish => label.cyan(),
        ArtifactStatus::ValidationFailed { .. } | ArtifactStatus::PublishFailed { .. } => {
            label.red()
        }
    }
}
