//! Source history seam and its `git` implementation.

use std::path::PathBuf;
use std::process::{Command, Output};

use thiserror::Error;

use policyship_core::CommitRef;

/// Errors from querying source history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to run git in {repo}: {source}")]
    Spawn {
        repo: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {args}` failed ({status}): {stderr}")]
    Command {
        args: String,
        status: String,
        stderr: String,
    },

    #[error("git output was not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Read-only view of the version-controlled source tree.
pub trait SourceHistory: Send + Sync {
    /// Resolve `rev` to a commit. `Ok(None)` when it does not name a commit.
    fn resolve(&self, rev: &str) -> Result<Option<CommitRef>, HistoryError>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor).
    fn is_ancestor(
        &self,
        ancestor: &CommitRef,
        descendant: &CommitRef,
    ) -> Result<bool, HistoryError>;

    /// Paths added or modified between `base` and `head`, relative to the
    /// repository root with `/` separators. With no `base`, every path in `head`.
    fn changed_paths(
        &self,
        base: Option<&CommitRef>,
        head: &CommitRef,
    ) -> Result<Vec<String>, HistoryError>;

    /// Most recent commit in `base..head` touching anything under `prefix`.
    fn latest_commit(
        &self,
        base: Option<&CommitRef>,
        head: &CommitRef,
        prefix: &str,
    ) -> Result<Option<CommitRef>, HistoryError>;

    /// Commit checked out in the working copy. `Ok(None)` before the first commit.
    fn checked_out(&self) -> Result<Option<CommitRef>, HistoryError>;

    /// Staged, unstaged or untracked paths under any of `roots`.
    fn uncommitted_paths(&self, roots: &[String]) -> Result<Vec<String>, HistoryError>;
}

/// [`SourceHistory`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo: PathBuf,
}

impl GitHistory {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn run(&self, args: &[&str]) -> Result<Output, HistoryError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .map_err(|source| HistoryError::Spawn {
                repo: self.repo.clone(),
                source,
            })
    }

    fn stdout(&self, args: &[&str]) -> Result<String, HistoryError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

fn command_failed(args: &[&str], output: &Output) -> HistoryError {
    HistoryError::Command {
        args: args.join(" "),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn split_nul(out: &str) -> Vec<String> {
    out.split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

impl SourceHistory for GitHistory {
    fn resolve(&self, rev: &str) -> Result<Option<CommitRef>, HistoryError> {
        let spec = format!("{rev}^{{commit}}");
        let args = ["rev-parse", "--verify", "--quiet", spec.as_str()];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => {
                let sha = String::from_utf8(output.stdout)?;
                Ok(Some(CommitRef::from(sha.trim())))
            }
            Some(1) => Ok(None),
            _ => Err(command_failed(&args, &output)),
        }
    }

    fn is_ancestor(
        &self,
        ancestor: &CommitRef,
        descendant: &CommitRef,
    ) -> Result<bool, HistoryError> {
        let args = ["merge-base", "--is-ancestor", ancestor.0.as_str(), descendant.0.as_str()];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_failed(&args, &output)),
        }
    }

    fn changed_paths(
        &self,
        base: Option<&CommitRef>,
        head: &CommitRef,
    ) -> Result<Vec<String>, HistoryError> {
        let out = match base {
            Some(base) => self.stdout(&[
                "diff",
                "--name-only",
                "--no-renames",
                "--diff-filter=ACMRT",
                "-z",
                base.0.as_str(),
                head.0.as_str(),
            ])?,
            None => self.stdout(&["ls-tree", "-r", "--name-only", "-z", head.0.as_str()])?,
        };
        Ok(split_nul(&out))
    }

    fn latest_commit(
        &self,
        base: Option<&CommitRef>,
        head: &CommitRef,
        prefix: &str,
    ) -> Result<Option<CommitRef>, HistoryError> {
        let range = match base {
            Some(base) => format!("{}..{}", base.0, head.0),
            None => head.0.clone(),
        };
        let out = self.stdout(&["log", "-1", "--format=%H", range.as_str(), "--", prefix])?;
        let sha = out.trim();
        Ok((!sha.is_empty()).then(|| CommitRef::from(sha)))
    }

    fn checked_out(&self) -> Result<Option<CommitRef>, HistoryError> {
        self.resolve("HEAD")
    }

    fn uncommitted_paths(&self, roots: &[String]) -> Result<Vec<String>, HistoryError> {
        let mut args = vec!["status", "--porcelain=v1", "-z", "--untracked-files=all", "--"];
        args.extend(roots.iter().map(String::as_str));
        let out = self.stdout(&args)?;
        Ok(parse_porcelain(&out))
    }
}

/// Paths from `git status --porcelain=v1 -z` output. Each entry is
/// `XY <path>`; renames and copies carry the original path as an extra entry.
fn parse_porcelain(out: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut entries = out.split('\0').filter(|e| !e.is_empty());
    while let Some(entry) = entries.next() {
        let Some(path) = entry.get(3..) else {
            continue;
        };
        paths.push(path.to_string());
        if entry.starts_with(&['R', 'C'][..]) {
            entries.next();
        }
    }
    paths
}
