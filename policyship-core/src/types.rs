//! Domain types for Policyship.
//!
//! An artifact ("policy") lives at `<collection>/<name>/v<semver>/` in the
//! source tree. Its [`ArtifactId`] is derived from that path and never changes:
//! two artifacts with the same id are the same immutable unit forever.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// An opaque commit reference in the source history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(pub String);

impl CommitRef {
    /// First 8 characters, for log lines and summaries.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitRef {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The release tag of the event that triggered a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseTag(pub String);

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ReleaseTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReleaseTag {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// ArtifactVersion
// ---------------------------------------------------------------------------

/// A version directory name: `v` followed by a strict SemVer 2.0 version.
///
/// Ordering follows SemVer precedence, so `v1.10.0` sorts after `v1.9.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactVersion(semver::Version);

impl ArtifactVersion {
    /// Parse a directory segment such as `v1.0.6`. Returns `None` for anything
    /// that is not `v<semver>`.
    pub fn parse(segment: &str) -> Option<Self> {
        let rest = segment.strip_prefix('v')?;
        semver::Version::parse(rest).ok().map(Self)
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ArtifactId
// ---------------------------------------------------------------------------

/// Error returned when a string is not a valid `<collection>/<name>/v<semver>` id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("artifact id '{0}' must have the form <collection>/<name>/v<semver>")]
    Shape(String),

    #[error("artifact id '{id}' has an invalid version segment '{segment}'")]
    Version { id: String, segment: String },
}

/// Immutable identity of an artifact: `(collection, name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    /// Collection root, possibly several `/`-separated segments (`policies`).
    pub collection: String,
    pub name: String,
    pub version: ArtifactVersion,
}

impl ArtifactId {
    pub fn new(
        collection: impl Into<String>,
        name: impl Into<String>,
        version: ArtifactVersion,
    ) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
            version,
        }
    }

    /// Path of the artifact directory relative to the repository root.
    pub fn relative_dir(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.collection.split('/') {
            path.push(segment);
        }
        path.join(&self.name).join(self.version.to_string())
    }

    /// Absolute artifact directory under `repo_root`.
    pub fn dir_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(self.relative_dir())
    }

    /// `/`-joined path prefix as it appears in source history listings.
    pub fn tree_prefix(&self) -> String {
        format!("{}/{}/{}", self.collection, self.name, self.version)
    }
}

impl Ord for ArtifactId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.collection.cmp(&other.collection))
    }
}

impl PartialOrd for ArtifactId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.name, self.version)
    }
}

impl FromStr for ArtifactId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '/');
        let (Some(version), Some(name), Some(collection)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(IdParseError::Shape(s.to_string()));
        };
        if name.is_empty() || collection.split('/').any(str::is_empty) {
            return Err(IdParseError::Shape(s.to_string()));
        }
        let version = ArtifactVersion::parse(version).ok_or_else(|| IdParseError::Version {
            id: s.to_string(),
            segment: version.to_string(),
        })?;
        Ok(Self::new(collection, name, version))
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = IdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One changed artifact, as reported by change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub id: ArtifactId,
    /// Most recent commit touching the artifact's subtree. Diagnostic only;
    /// never used to decide re-delivery.
    pub latest_commit: CommitRef,
}

/// Proof that an artifact id was delivered. Written once, never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub delivered_at: DateTime<Utc>,
    pub release: ReleaseTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
