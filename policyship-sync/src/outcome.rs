//! Per-artifact run outcomes.
//!
//! One [`RunOutcome`] exists per detected artifact per run. Outcomes decide
//! baseline advancement and feed the ledger merge, then are discarded.

use serde::Serialize;

use policyship_core::{ArtifactId, CommitRef};

/// How a delivered artifact came to be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryPath {
    /// The registry accepted the publish request (2xx).
    Published,
    /// The registry answered 409: the version already exists.
    Conflict,
    /// The existence probe found the version before any publish.
    RemoteExists,
}

impl DeliveryPath {
    /// Note stored on the delivery record.
    pub fn note(&self) -> &'static str {
        match self {
            DeliveryPath::Published => "published",
            DeliveryPath::Conflict => "registry reported conflict (409)",
            DeliveryPath::RemoteExists => "already present in registry",
        }
    }
}

/// Terminal state of one artifact in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ArtifactStatus {
    /// A delivery record already exists. `modified_after_delivery` is set when
    /// the artifact's subtree was touched by a commit other than the one
    /// recorded at delivery.
    Skipped { modified_after_delivery: bool },
    Delivered { via: DeliveryPath },
    ValidationFailed { errors: Vec<String> },
    PublishFailed { reason: String },
    /// Dry-run only: valid and not yet in the registry.
    WouldPublish,
}

impl ArtifactStatus {
    /// `validation-failed` / `publish-failed`: keeps the artifact pending and
    /// blocks baseline advancement.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::ValidationFailed { .. } | ArtifactStatus::PublishFailed { .. }
        )
    }

    /// `skipped` / `delivered`.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::Skipped { .. } | ArtifactStatus::Delivered { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactStatus::Skipped { .. } => "skipped",
            ArtifactStatus::Delivered { .. } => "delivered",
            ArtifactStatus::ValidationFailed { .. } => "validation-failed",
            ArtifactStatus::PublishFailed { .. } => "publish-failed",
            ArtifactStatus::WouldPublish => "would-publish",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ArtifactStatus::Skipped {
                modified_after_delivery: true,
            } => "already delivered; content changed after delivery and was ignored".into(),
            ArtifactStatus::Skipped { .. } => "already delivered".into(),
            ArtifactStatus::Delivered { via } => via.note().into(),
            ArtifactStatus::ValidationFailed { errors } => errors.join("; "),
            ArtifactStatus::PublishFailed { reason } => reason.clone(),
            ArtifactStatus::WouldPublish => "valid; would publish".into(),
        }
    }
}

/// Outcome of one artifact's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub id: ArtifactId,
    pub latest_commit: CommitRef,
    #[serde(flatten)]
    pub status: ArtifactStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunOutcome {
    pub fn new(id: ArtifactId, latest_commit: CommitRef, status: ArtifactStatus) -> Self {
        Self {
            id,
            latest_commit,
            status,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_and_publish_failures_are_failures() {
        assert!(ArtifactStatus::PublishFailed { reason: "x".into() }.is_failure());
        assert!(ArtifactStatus::ValidationFailed { errors: vec![] }.is_failure());
        assert!(!ArtifactStatus::WouldPublish.is_failure());
        assert!(!ArtifactStatus::WouldPublish.is_success());
        assert!(ArtifactStatus::Delivered {
            via: DeliveryPath::Conflict
        }
        .is_success());
    }

    #[test]
    fn outcome_serializes_flat_with_status_tag() {
        let outcome = RunOutcome::new(
            "policies/x/v1.0.0".parse().unwrap(),
            CommitRef::from("c5"),
            ArtifactStatus::Delivered {
                via: DeliveryPath::RemoteExists,
            },
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["id"], "policies/x/v1.0.0");
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["via"], "remote-exists");
        assert!(json.get("warnings").is_none());
    }
}
