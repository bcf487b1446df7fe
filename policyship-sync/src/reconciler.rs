//! Reconciler: one run of detect → filter → pool → merge → persist.
//!
//! The ledger is read once at the start and written once at the end, by the
//! reconciler alone. Any fatal error (unusable baseline, a working copy that
//! does not match head, ledger I/O, cancellation) returns before the write,
//! leaving the ledger untouched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;

use policyship_core::{ledger, ArtifactId, ChangeRecord, CommitRef, Ledger, ReleaseTag};
use policyship_detector::{detect, ensure_checkout, SourceHistory};

use crate::eligibility;
use crate::error::ReconcileError;
use crate::merge;
use crate::outcome::{ArtifactStatus, RunOutcome};
use crate::packager::Packager;
use crate::pool::{self, WorkerContext};
use crate::registry::RegistryClient;
use crate::validator::Validator;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// External systems a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn SourceHistory>,
    /// Required unless the run is a dry run.
    pub registry: Option<Arc<dyn RegistryClient>>,
    pub validator: Arc<dyn Validator>,
    pub packager: Arc<dyn Packager>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Revision to reconcile up to (`HEAD`, a tag, a full hash).
    pub head: String,
    /// Release recorded on new delivery records.
    pub release: ReleaseTag,
    pub workers: usize,
    pub probe: bool,
    /// Probe and validate, but never publish or write the ledger.
    pub dry_run: bool,
    /// Abort with [`ReconcileError::Cancelled`] on ctrl-c during the pool phase.
    pub handle_interrupts: bool,
}

impl RunOptions {
    pub fn new(head: impl Into<String>, release: impl Into<ReleaseTag>) -> Self {
        Self {
            head: head.into(),
            release: release.into(),
            workers: policyship_core::config::DEFAULT_WORKERS,
            probe: true,
            dry_run: false,
            handle_interrupts: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Detection plus eligibility, with no registry calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub head: CommitRef,
    pub baseline: Option<CommitRef>,
    /// Changed and not yet delivered.
    pub pending: Vec<ChangeRecord>,
    /// Changed but already delivered.
    pub skipped: Vec<RunOutcome>,
}

/// Work out what a run at `head` would do against `ledger`.
pub fn plan(
    history: &dyn SourceHistory,
    ledger: &Ledger,
    head: &str,
    roots: &[String],
) -> Result<Plan, ReconcileError> {
    let detection = detect(history, ledger.baseline.as_ref(), head, roots)?;
    let eligibility = eligibility::filter(detection.changes, ledger);
    Ok(Plan {
        head: detection.head,
        baseline: ledger.baseline.clone(),
        pending: eligibility.pending,
        skipped: eligibility.skipped,
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Every artifact reached `skipped` or `delivered` (or `would-publish`).
    TotalSuccess,
    /// At least one artifact failed and stays pending.
    PartialSuccess,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would_publish: usize,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub head: CommitRef,
    pub release: ReleaseTag,
    pub baseline_before: Option<CommitRef>,
    pub baseline_after: Option<CommitRef>,
    /// Whether the baseline moved (or, in a dry run, would move) to head.
    pub advanced: bool,
    pub dry_run: bool,
    pub ledger_written: bool,
    /// One per changed artifact, sorted by id.
    pub outcomes: Vec<RunOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn verdict(&self) -> Verdict {
        if self.outcomes.iter().any(|o| o.status.is_failure()) {
            Verdict::PartialSuccess
        } else {
            Verdict::TotalSuccess
        }
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                ArtifactStatus::Skipped { .. } => counts.skipped += 1,
                ArtifactStatus::Delivered { .. } => counts.delivered += 1,
                ArtifactStatus::ValidationFailed { .. } | ArtifactStatus::PublishFailed { .. } => {
                    counts.failed += 1
                }
                ArtifactStatus::WouldPublish => counts.would_publish += 1,
            }
        }
        counts
    }

    /// Artifacts left for the next run.
    pub fn pending(&self) -> Vec<&ArtifactId> {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_failure())
            .map(|o| &o.id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    repo_root: PathBuf,
    ledger_dir: PathBuf,
    roots: Vec<String>,
    collaborators: Collaborators,
}

impl Reconciler {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        ledger_dir: impl Into<PathBuf>,
        roots: Vec<String>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            ledger_dir: ledger_dir.into(),
            roots,
            collaborators,
        }
    }

    /// [`plan`] against the persisted ledger.
    pub fn plan(&self, head: &str) -> Result<Plan, ReconcileError> {
        let ledger = ledger::load_at(&self.ledger_dir)?;
        plan(
            self.collaborators.history.as_ref(),
            &ledger,
            head,
            &self.roots,
        )
    }

    /// Execute one reconciliation run.
    pub fn run(&self, opts: &RunOptions) -> Result<RunReport, ReconcileError> {
        let started = Instant::now();
        if !opts.dry_run && self.collaborators.registry.is_none() {
            return Err(ReconcileError::MissingRegistry);
        }

        let ledger = ledger::load_at(&self.ledger_dir)?;
        let plan = plan(
            self.collaborators.history.as_ref(),
            &ledger,
            &opts.head,
            &self.roots,
        )?;
        tracing::info!(
            head = %plan.head.short(),
            baseline = plan.baseline.as_ref().map(|b| b.short().to_string()).unwrap_or_default(),
            pending = plan.pending.len(),
            skipped = plan.skipped.len(),
            "changes detected"
        );

        let mut outcomes = plan.skipped;
        if !plan.pending.is_empty() {
            ensure_checkout(self.collaborators.history.as_ref(), &plan.head, &self.roots)?;
            let ctx = WorkerContext {
                repo_root: self.repo_root.clone(),
                registry: self.collaborators.registry.clone(),
                validator: self.collaborators.validator.clone(),
                packager: self.collaborators.packager.clone(),
                probe: opts.probe,
                dry_run: opts.dry_run,
            };
            outcomes.extend(dispatch(ctx, plan.pending, opts)?);
        }
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));

        let next = merge::next_ledger(&ledger, &outcomes, &plan.head, &opts.release, Utc::now());
        let advanced = merge::should_advance(&outcomes);
        let ledger_written = !opts.dry_run && next != ledger;
        if ledger_written {
            ledger::save_at(&self.ledger_dir, &next)?;
            tracing::info!(dir = %self.ledger_dir.display(), "ledger updated");
        }
        if !advanced {
            tracing::warn!(
                baseline = plan.baseline.as_ref().map(|b| b.short().to_string()).unwrap_or_default(),
                "baseline held; failed artifacts remain pending"
            );
        }

        Ok(RunReport {
            head: plan.head,
            release: opts.release.clone(),
            baseline_before: ledger.baseline,
            baseline_after: next.baseline,
            advanced,
            dry_run: opts.dry_run,
            ledger_written,
            outcomes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Run the pool on a dedicated runtime, racing it against ctrl-c when asked.
fn dispatch(
    ctx: WorkerContext,
    pending: Vec<ChangeRecord>,
    opts: &RunOptions,
) -> Result<Vec<RunOutcome>, ReconcileError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ReconcileError::Runtime)?;
    let width = opts.workers;
    let handle_interrupts = opts.handle_interrupts;

    let result = runtime.block_on(async move {
        let pool = pool::run_pool(ctx, pending, width);
        if !handle_interrupts {
            return Ok(pool.await);
        }
        tokio::pin!(pool);
        tokio::select! {
            outcomes = &mut pool => Ok(outcomes),
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    tracing::warn!("received ctrl-c, abandoning run before ledger update");
                    Err(ReconcileError::Cancelled)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "ctrl-c handler unavailable; waiting for workers");
                    Ok(pool.await)
                }
            }
        }
    });
    // Blocking workers may still be mid-request after cancellation.
    runtime.shutdown_background();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::DeliveryPath;

    fn outcome(name: &str, status: ArtifactStatus) -> RunOutcome {
        RunOutcome::new(
            format!("policies/{name}/v1.0.0").parse().unwrap(),
            CommitRef::from("c5"),
            status,
        )
    }

    fn report(outcomes: Vec<RunOutcome>) -> RunReport {
        RunReport {
            head: CommitRef::from("c5"),
            release: ReleaseTag::from("r2"),
            baseline_before: Some(CommitRef::from("c1")),
            baseline_after: Some(CommitRef::from("c1")),
            advanced: false,
            dry_run: false,
            ledger_written: true,
            outcomes,
            duration_ms: 0,
        }
    }

    #[test]
    fn verdict_and_counts() {
        let report = report(vec![
            outcome(
                "a",
                ArtifactStatus::Delivered {
                    via: DeliveryPath::Published,
                },
            ),
            outcome(
                "b",
                ArtifactStatus::ValidationFailed {
                    errors: vec!["bad".into()],
                },
            ),
            outcome(
                "c",
                ArtifactStatus::Skipped {
                    modified_after_delivery: false,
                },
            ),
        ]);
        assert_eq!(report.verdict(), Verdict::PartialSuccess);
        assert_eq!(
            report.counts(),
            StatusCounts {
                delivered: 1,
                skipped: 1,
                failed: 1,
                would_publish: 0
            }
        );
        let pending: Vec<String> = report.pending().iter().map(|id| id.to_string()).collect();
        assert_eq!(pending, vec!["policies/b/v1.0.0"]);
    }

    #[test]
    fn empty_run_is_total_success() {
        assert_eq!(report(vec![]).verdict(), Verdict::TotalSuccess);
    }

    #[test]
    fn run_options_defaults() {
        let opts = RunOptions::new("HEAD", "r1");
        assert_eq!(opts.workers, 3);
        assert!(opts.probe);
        assert!(!opts.dry_run);
    }
}
