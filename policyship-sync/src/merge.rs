//! Ledger merge and baseline decision.
//!
//! The merge is a pure union keyed by artifact id. Existing records always
//! win, so the result does not depend on the order workers finished in.

use chrono::{DateTime, Utc};

use policyship_core::ledger::DeliveryMap;
use policyship_core::{CommitRef, DeliveryRecord, Ledger, ReleaseTag};

use crate::outcome::{ArtifactStatus, RunOutcome};

/// Add a record for every `delivered` outcome that has none yet.
pub fn merge_deliveries(
    deliveries: &DeliveryMap,
    outcomes: &[RunOutcome],
    release: &ReleaseTag,
    now: DateTime<Utc>,
) -> DeliveryMap {
    let mut merged = deliveries.clone();
    for outcome in outcomes {
        let ArtifactStatus::Delivered { via } = &outcome.status else {
            continue;
        };
        merged
            .entry(outcome.id.clone())
            .or_insert_with(|| DeliveryRecord {
                delivered_at: now,
                release: release.clone(),
                commit: Some(outcome.latest_commit.clone()),
                note: Some(via.note().to_string()),
            });
    }
    merged
}

/// True when every outcome is `skipped` or `delivered` (vacuously true when empty).
pub fn should_advance(outcomes: &[RunOutcome]) -> bool {
    outcomes.iter().all(|o| o.status.is_success())
}

/// The ledger to persist after a run: merged records, and the baseline moved
/// to `head` only if [`should_advance`].
pub fn next_ledger(
    ledger: &Ledger,
    outcomes: &[RunOutcome],
    head: &CommitRef,
    release: &ReleaseTag,
    now: DateTime<Utc>,
) -> Ledger {
    let baseline = if should_advance(outcomes) {
        Some(head.clone())
    } else {
        ledger.baseline.clone()
    };
    Ledger {
        baseline,
        deliveries: merge_deliveries(&ledger.deliveries, outcomes, release, now),
    }
}
