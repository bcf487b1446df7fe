//! Shared entrypoints that wire a repository's configuration to a [`Reconciler`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use policyship_core::Config;
use policyship_detector::GitHistory;

use crate::error::ReconcileError;
use crate::packager::ManifestPackager;
use crate::reconciler::{Collaborators, Plan, Reconciler, RunOptions, RunReport};
use crate::registry::{HttpRegistry, RegistryClient, TOKEN_ENV};
use crate::validator::ChainValidator;

/// Production collaborators: `git`, the HTTP registry (when configured),
/// structure + command validation, and manifest packaging.
pub fn collaborators(repo_root: &Path, config: &Config) -> Collaborators {
    let registry = config.registry_url.as_deref().map(|url| {
        let client = HttpRegistry::new(url, Duration::from_secs(config.timeout_secs))
            .with_token(std::env::var(TOKEN_ENV).ok());
        Arc::new(client) as Arc<dyn RegistryClient>
    });
    Collaborators {
        history: Arc::new(GitHistory::new(repo_root)),
        registry,
        validator: Arc::new(ChainValidator::from_config(&config.validator)),
        packager: Arc::new(ManifestPackager),
    }
}

pub fn reconciler(repo_root: &Path, config: &Config) -> Reconciler {
    Reconciler::new(
        repo_root,
        config.ledger_dir_in(repo_root),
        config.collection_roots(),
        collaborators(repo_root, config),
    )
}

/// Run a reconciliation for the repository at `repo_root`.
pub fn run_at(
    repo_root: &Path,
    config: &Config,
    opts: &RunOptions,
) -> Result<RunReport, ReconcileError> {
    config.validate()?;
    reconciler(repo_root, config).run(opts)
}

/// Plan a run without contacting the registry.
pub fn plan_at(repo_root: &Path, config: &Config, head: &str) -> Result<Plan, ReconcileError> {
    config.validate()?;
    reconciler(repo_root, config).plan(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn registry_is_optional() {
        let repo = TempDir::new().expect("repo");
        let config = Config::default();
        assert!(collaborators(repo.path(), &config).registry.is_none());

        let config = Config {
            registry_url: Some("http://registry.local".into()),
            ..Config::default()
        };
        assert!(collaborators(repo.path(), &config).registry.is_some());
    }

    #[test]
    fn reconcile_without_registry_is_rejected_before_touching_git() {
        let repo = TempDir::new().expect("repo");
        let err = run_at(repo.path(), &Config::default(), &RunOptions::new("HEAD", "r1"))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MissingRegistry));
    }

    #[test]
    fn invalid_config_is_fatal() {
        let repo = TempDir::new().expect("repo");
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(matches!(
            plan_at(repo.path(), &config, "HEAD"),
            Err(ReconcileError::Config(_))
        ));
    }
}
