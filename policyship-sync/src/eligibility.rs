//! Eligibility filter: splits detected changes into pending and skipped.
//!
//! A delivery record makes an id immutable: later content changes under the
//! same version directory never trigger a second delivery. This is a fast path
//! only; the idempotent publish call is what actually prevents duplicates.

use policyship_core::{ChangeRecord, Ledger};

use crate::outcome::{ArtifactStatus, RunOutcome};

/// Result of [`filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eligibility {
    /// No delivery record yet; handed to the worker pool.
    pub pending: Vec<ChangeRecord>,
    /// Already delivered; terminal `skipped` outcomes.
    pub skipped: Vec<RunOutcome>,
}

/// Classify each change against `ledger`. Input order is preserved.
pub fn filter(changes: Vec<ChangeRecord>, ledger: &Ledger) -> Eligibility {
    let mut result = Eligibility::default();
    for change in changes {
        let Some(record) = ledger.record(&change.id) else {
            result.pending.push(change);
            continue;
        };

        let modified_after_delivery = record
            .commit
            .as_ref()
            .is_some_and(|delivered| *delivered != change.latest_commit);
        if modified_after_delivery {
            tracing::warn!(
                artifact = %change.id,
                delivered_release = %record.release,
                latest_commit = %change.latest_commit,
                "content changed under an already-delivered version; publish a new version instead"
            );
        } else {
            tracing::debug!(artifact = %change.id, "already delivered, skipping");
        }

        result.skipped.push(RunOutcome::new(
            change.id,
            change.latest_commit,
            ArtifactStatus::Skipped {
                modified_after_delivery,
            },
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use policyship_core::{CommitRef, DeliveryRecord, ReleaseTag};

    fn change(id: &str, commit: &str) -> ChangeRecord {
        ChangeRecord {
            id: id.parse().unwrap(),
            latest_commit: CommitRef::from(commit),
        }
    }

    fn ledger_with(id: &str, commit: Option<&str>) -> Ledger {
        let mut ledger = Ledger::default();
        ledger.deliveries.insert(
            id.parse().unwrap(),
            DeliveryRecord {
                delivered_at: Utc::now(),
                release: ReleaseTag::from("r1"),
                commit: commit.map(CommitRef::from),
                note: None,
            },
        );
        ledger
    }

    #[test]
    fn unknown_ids_are_pending() {
        let result = filter(vec![change("policies/a/v1.0.0", "c2")], &Ledger::default());
        assert_eq!(result.pending.len(), 1);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn delivered_ids_are_skipped() {
        let ledger = ledger_with("policies/a/v1.0.0", Some("c2"));
        let result = filter(
            vec![change("policies/a/v1.0.0", "c2"), change("policies/b/v1.0.0", "c3")],
            &ledger,
        );
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].id.name, "b");
        assert_eq!(
            result.skipped[0].status,
            ArtifactStatus::Skipped {
                modified_after_delivery: false
            }
        );
    }

    #[test]
    fn later_commit_on_delivered_id_is_flagged_but_still_skipped() {
        let ledger = ledger_with("policies/a/v1.0.0", Some("c2"));
        let result = filter(vec![change("policies/a/v1.0.0", "c4")], &ledger);
        assert!(result.pending.is_empty());
        assert_eq!(
            result.skipped[0].status,
            ArtifactStatus::Skipped {
                modified_after_delivery: true
            }
        );
    }

    #[test]
    fn record_without_commit_is_never_flagged() {
        let ledger = ledger_with("policies/a/v1.0.0", None);
        let result = filter(vec![change("policies/a/v1.0.0", "c9")], &ledger);
        assert_eq!(
            result.skipped[0].status,
            ArtifactStatus::Skipped {
                modified_after_delivery: false
            }
        );
    }
}
