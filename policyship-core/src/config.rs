//! `.policyship.yaml`: per-repository configuration.
//!
//! Every key is optional; a missing file yields [`Config::default`]. CLI flags
//! override file values after loading.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::LEDGER_DIR;

pub const CONFIG_FILE: &str = ".policyship.yaml";
pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// External command run inside each artifact directory. Empty = none.
    pub command: Vec<String>,
    /// Entries (files or directories) every artifact directory must contain.
    pub required_files: Vec<String>,
}

/// Repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    /// Collection roots scanned for `<name>/v<semver>/` directories.
    pub collections: Vec<String>,
    /// Worker pool width.
    pub workers: usize,
    /// Whether to ask the registry if an artifact exists before publishing.
    pub probe: bool,
    pub timeout_secs: u64,
    /// Ledger directory, relative to the repository root.
    pub ledger_dir: PathBuf,
    pub validator: ValidatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: None,
            collections: vec!["policies".to_string()],
            workers: DEFAULT_WORKERS,
            probe: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ledger_dir: PathBuf::from(LEDGER_DIR),
            validator: ValidatorConfig::default(),
        }
    }
}

impl Config {
    /// Reject values the reconciler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.collections.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one collection root is required".into(),
            ));
        }
        for root in &self.collections {
            let trimmed = root.trim_matches('/');
            if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
                return Err(ConfigError::Invalid(format!(
                    "collection root '{root}' is not a relative path"
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Collection roots with leading/trailing slashes removed.
    pub fn collection_roots(&self) -> Vec<String> {
        self.collections
            .iter()
            .map(|c| c.trim_matches('/').to_string())
            .collect()
    }

    /// Absolute ledger directory for `repo_root`.
    pub fn ledger_dir_in(&self, repo_root: &Path) -> PathBuf {
        if self.ledger_dir.is_absolute() {
            self.ledger_dir.clone()
        } else {
            repo_root.join(&self.ledger_dir)
        }
    }
}

/// `<repo_root>/.policyship.yaml`
pub fn config_path_at(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_FILE)
}

/// Load config from an explicit file path. Missing file ⇒ defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load `<repo_root>/.policyship.yaml`.
pub fn load_at(repo_root: &Path) -> Result<Config, ConfigError> {
    load_from(&config_path_at(repo_root))
}
