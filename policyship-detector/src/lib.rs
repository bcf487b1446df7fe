//! Change detection for `policyship-detector`.
//!
//! [`detect`] diffs the persisted baseline against the release head and
//! returns one [`ChangeRecord`] per artifact directory touched in between.
//! Only paths shaped `<collection>/<name>/v<semver>/<file…>` count; anything
//! else in the diff is ignored.

pub mod history;

use std::collections::BTreeSet;

use thiserror::Error;

use policyship_core::{ArtifactId, ArtifactVersion, ChangeRecord, CommitRef};

pub use history::{GitHistory, HistoryError, SourceHistory};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from change detection. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The baseline no longer resolves, or is not an ancestor of head.
    #[error("baseline {baseline} is not usable: {reason}")]
    InvalidBaseline { baseline: CommitRef, reason: String },

    #[error("head '{head}' does not name a commit")]
    InvalidHead { head: String },

    /// Artifact content is read from the working copy, which holds another commit.
    #[error("working copy is at {}, not head {head}; check out head before reconciling", checked_out.as_ref().map_or("no commit", |c| c.short()))]
    HeadNotCheckedOut {
        head: CommitRef,
        checked_out: Option<CommitRef>,
    },

    /// Uncommitted edits under a collection root would leak into published content.
    #[error("{} uncommitted path(s) under collection roots, first: {}", paths.len(), paths.first().map_or("", String::as_str))]
    UncommittedChanges { paths: Vec<String> },

    #[error("source history error: {0}")]
    History(#[from] HistoryError),
}

/// Result of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Head resolved to a full commit ref.
    pub head: CommitRef,
    /// Changed artifacts, sorted by name then version.
    pub changes: Vec<ChangeRecord>,
}

// ---------------------------------------------------------------------------
// Path matching
// ---------------------------------------------------------------------------

/// Map a changed path to the artifact directory that contains it.
///
/// `roots` are collection roots such as `policies`. When roots nest, the
/// longest matching root wins. Returns `None` for paths outside any root,
/// paths directly at `<root>/<name>/<version>` (no file beneath), and version
/// segments that are not `v<semver>`.
pub fn match_artifact_path(path: &str, roots: &[String]) -> Option<ArtifactId> {
    let path = path.trim_start_matches("./");
    let mut ordered: Vec<&str> = roots.iter().map(|r| r.trim_matches('/')).collect();
    ordered.sort_by_key(|r| std::cmp::Reverse(r.len()));

    for root in ordered {
        if root.is_empty() {
            continue;
        }
        let Some(rest) = path
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            continue;
        };
        let mut segments = rest.split('/');
        let (Some(name), Some(version), Some(file)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return None;
        };
        if name.is_empty() || file.is_empty() {
            return None;
        }
        let version = ArtifactVersion::parse(version)?;
        return Some(ArtifactId::new(root, name, version));
    }
    None
}

// ---------------------------------------------------------------------------
// detect
// ---------------------------------------------------------------------------

/// Compute the artifacts changed between `baseline` and `head`.
///
/// With no baseline (first run) every artifact present at `head` is a change.
/// No changes is an empty result, not an error.
pub fn detect(
    history: &dyn SourceHistory,
    baseline: Option<&CommitRef>,
    head: &str,
    roots: &[String],
) -> Result<Detection, DetectError> {
    let head_ref = history
        .resolve(head)?
        .ok_or_else(|| DetectError::InvalidHead {
            head: head.to_string(),
        })?;

    let base_ref = match baseline {
        Some(baseline) => {
            let resolved =
                history
                    .resolve(&baseline.0)?
                    .ok_or_else(|| DetectError::InvalidBaseline {
                        baseline: baseline.clone(),
                        reason: "commit not found in source history".into(),
                    })?;
            if !history.is_ancestor(&resolved, &head_ref)? {
                return Err(DetectError::InvalidBaseline {
                    baseline: baseline.clone(),
                    reason: format!("not an ancestor of head {}", head_ref.short()),
                });
            }
            Some(resolved)
        }
        None => None,
    };

    let paths = history.changed_paths(base_ref.as_ref(), &head_ref)?;
    let mut ids = BTreeSet::new();
    let mut ignored = 0usize;
    for path in &paths {
        match match_artifact_path(path, roots) {
            Some(id) => {
                ids.insert(id);
            }
            None => ignored += 1,
        }
    }
    tracing::debug!(
        changed_paths = paths.len(),
        ignored,
        artifacts = ids.len(),
        "diffed source history"
    );

    let mut changes = Vec::with_capacity(ids.len());
    for id in ids {
        let latest_commit = history
            .latest_commit(base_ref.as_ref(), &head_ref, &id.tree_prefix())?
            .unwrap_or_else(|| head_ref.clone());
        changes.push(ChangeRecord { id, latest_commit });
    }

    Ok(Detection {
        head: head_ref,
        changes,
    })
}

// ---------------------------------------------------------------------------
// ensure_checkout
// ---------------------------------------------------------------------------

/// Check that the working copy holds exactly `head` under `roots`.
///
/// Validators and packagers read artifact directories from disk, so anything
/// else would publish content that does not exist at `head`.
pub fn ensure_checkout(
    history: &dyn SourceHistory,
    head: &CommitRef,
    roots: &[String],
) -> Result<(), DetectError> {
    let checked_out = history.checked_out()?;
    if checked_out.as_ref() != Some(head) {
        return Err(DetectError::HeadNotCheckedOut {
            head: head.clone(),
            checked_out,
        });
    }
    let paths = history.uncommitted_paths(roots)?;
    if !paths.is_empty() {
        return Err(DetectError::UncommittedChanges { paths });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
