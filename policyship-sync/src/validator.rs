//! Artifact validators.
//!
//! Validators inspect an artifact directory and report problems as values.
//! Any error in the report yields a `validation-failed` outcome; warnings are
//! carried along without affecting the outcome.

use std::path::Path;
use std::process::Command;

use policyship_core::config::ValidatorConfig;
use policyship_core::ArtifactId;

/// Environment variable exposing the artifact id to a validation command.
pub const ARTIFACT_ENV: &str = "POLICYSHIP_ARTIFACT";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, id: &ArtifactId, dir: &Path) -> ValidationReport;
}

// ---------------------------------------------------------------------------
// StructureValidator
// ---------------------------------------------------------------------------

/// Checks the directory exists, is non-empty, and holds every required entry.
#[derive(Debug, Clone, Default)]
pub struct StructureValidator {
    required: Vec<String>,
}

impl StructureValidator {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }
}

impl Validator for StructureValidator {
    fn validate(&self, id: &ArtifactId, dir: &Path) -> ValidationReport {
        let report = ValidationReport::default();
        if !dir.is_dir() {
            return report.error(format!("artifact directory {} does not exist", id.tree_prefix()));
        }
        let empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);
        if empty {
            return report.error(format!("artifact directory {} is empty", id.tree_prefix()));
        }
        self.required
            .iter()
            .filter(|entry| !dir.join(entry.as_str()).exists())
            .fold(report, |report, entry| {
                report.error(format!("missing required entry '{entry}'"))
            })
    }
}

// ---------------------------------------------------------------------------
// CommandValidator
// ---------------------------------------------------------------------------

/// Runs an external command inside the artifact directory.
///
/// Exit 0 passes; stderr lines become warnings. Any other exit fails, with
/// stderr lines (or stdout, when stderr is silent) as errors.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
}

impl CommandValidator {
    /// `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

fn non_empty_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl Validator for CommandValidator {
    fn validate(&self, id: &ArtifactId, dir: &Path) -> ValidationReport {
        let mut report = ValidationReport::default();
        let output = match Command::new(&self.program)
            .args(&self.args)
            .current_dir(dir)
            .env(ARTIFACT_ENV, id.to_string())
            .output()
        {
            Ok(output) => output,
            Err(e) => return report.error(format!("failed to run '{}': {e}", self.program)),
        };

        let stderr = non_empty_lines(&output.stderr);
        if output.status.success() {
            report.warnings = stderr;
            return report;
        }

        let mut errors = if stderr.is_empty() {
            non_empty_lines(&output.stdout)
        } else {
            stderr
        };
        if errors.is_empty() {
            errors.push(format!("'{}' exited with {}", self.program, output.status));
        }
        report.errors = errors;
        report
    }
}

// ---------------------------------------------------------------------------
// ChainValidator
// ---------------------------------------------------------------------------

/// Runs validators in order, stopping after the first that reports errors.
#[derive(Default)]
pub struct ChainValidator {
    validators: Vec<Box<dyn Validator>>,
}

impl ChainValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Structure checks plus the configured command, if any.
    pub fn from_config(config: &ValidatorConfig) -> Self {
        let chain = Self::new().with(StructureValidator::new(config.required_files.clone()));
        match CommandValidator::from_argv(&config.command) {
            Some(command) => chain.with(command),
            None => chain,
        }
    }
}

impl Validator for ChainValidator {
    fn validate(&self, id: &ArtifactId, dir: &Path) -> ValidationReport {
        let mut report = ValidationReport::default();
        for validator in &self.validators {
            report.merge(validator.validate(id, dir));
            if !report.is_valid() {
                break;
            }
        }
        report
    }
}
