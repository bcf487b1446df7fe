//! Bounded worker pool running one artifact pipeline per pending change.
//!
//! Each pipeline is blocking (HTTP, validator subprocess, file reads) and runs
//! on tokio's blocking pool. A semaphore caps how many run at once. Workers
//! only return outcomes; they never touch the ledger.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use policyship_core::ChangeRecord;

use crate::outcome::{ArtifactStatus, DeliveryPath, RunOutcome};
use crate::packager::Packager;
use crate::probe::{probe, ProbeResult};
use crate::publisher::publish;
use crate::registry::{PublishRequest, RegistryClient};
use crate::validator::Validator;

/// Everything a worker needs, shared across the pool.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub repo_root: PathBuf,
    /// `None` only for dry runs with no registry configured.
    pub registry: Option<Arc<dyn RegistryClient>>,
    pub validator: Arc<dyn Validator>,
    pub packager: Arc<dyn Packager>,
    pub probe: bool,
    pub dry_run: bool,
}

/// Probe → validate → package → publish for one artifact.
pub(crate) fn process(ctx: &WorkerContext, change: &ChangeRecord) -> RunOutcome {
    let id = &change.id;
    let dir = id.dir_in(&ctx.repo_root);
    let mut warnings = Vec::new();
    let finish = |status: ArtifactStatus, warnings: Vec<String>| {
        tracing::info!(artifact = %id, status = status.label(), "artifact finished");
        RunOutcome::new(id.clone(), change.latest_commit.clone(), status).with_warnings(warnings)
    };

    if let (true, Some(registry)) = (ctx.probe, ctx.registry.as_deref()) {
        match probe(registry, id) {
            ProbeResult::Exists => {
                return finish(
                    ArtifactStatus::Delivered {
                        via: DeliveryPath::RemoteExists,
                    },
                    warnings,
                );
            }
            ProbeResult::NotFound => {}
            ProbeResult::Unknown(detail) => {
                warnings.push(format!("existence probe inconclusive: {detail}"));
            }
        }
    }

    let report = ctx.validator.validate(id, &dir);
    warnings.extend(report.warnings);
    if !report.errors.is_empty() {
        return finish(
            ArtifactStatus::ValidationFailed {
                errors: report.errors,
            },
            warnings,
        );
    }

    if ctx.dry_run {
        return finish(ArtifactStatus::WouldPublish, warnings);
    }

    let Some(registry) = ctx.registry.as_deref() else {
        return finish(
            ArtifactStatus::PublishFailed {
                reason: "no registry configured".into(),
            },
            warnings,
        );
    };

    let body = match ctx.packager.package(change, &dir) {
        Ok(body) => body,
        Err(e) => {
            return finish(
                ArtifactStatus::PublishFailed {
                    reason: format!("packaging failed: {e}"),
                },
                warnings,
            );
        }
    };

    let request = PublishRequest::new(id.clone(), body);
    let status = match publish(registry, &request).into_delivery() {
        Ok(via) => ArtifactStatus::Delivered { via },
        Err(reason) => ArtifactStatus::PublishFailed { reason },
    };
    finish(status, warnings)
}

/// Run every pending change through [`process`], at most `width` at a time.
///
/// Returns exactly one outcome per input change, sorted by artifact id. A
/// worker that panics yields `publish-failed` for its artifact.
pub(crate) async fn run_pool(
    ctx: WorkerContext,
    pending: Vec<ChangeRecord>,
    width: usize,
) -> Vec<RunOutcome> {
    let semaphore = Arc::new(Semaphore::new(width.max(1)));
    let mut set = JoinSet::new();

    for change in pending.iter().cloned() {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = semaphore.acquire_owned().await.ok();
            let id = change.id.clone();
            let latest_commit = change.latest_commit.clone();
            match tokio::task::spawn_blocking(move || process(&ctx, &change)).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(artifact = %id, error = %err, "worker aborted");
                    RunOutcome::new(
                        id,
                        latest_commit,
                        ArtifactStatus::PublishFailed {
                            reason: format!("worker aborted: {err}"),
                        },
                    )
                }
            }
        });
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => tracing::error!(error = %err, "worker task join failure"),
        }
    }

    // Any change without an outcome failed to report; keep it pending.
    for change in &pending {
        if !outcomes.iter().any(|o| o.id == change.id) {
            outcomes.push(RunOutcome::new(
                change.id.clone(),
                change.latest_commit.clone(),
                ArtifactStatus::PublishFailed {
                    reason: "worker did not report an outcome".into(),
                },
            ));
        }
    }

    outcomes.sort_by(|a, b| a.id.cmp(&b.id));
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::registry::HttpReply;
    use crate::validator::ValidationReport;
    use policyship_core::{ArtifactId, CommitRef};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Registry {
        lookup_status: u16,
        publish_status: u16,
        submits: Mutex<Vec<String>>,
    }

    impl RegistryClient for Registry {
        fn lookup(&self, _: &ArtifactId) -> Result<u16, TransportError> {
            Ok(self.lookup_status)
        }
        fn submit(&self, request: &PublishRequest) -> Result<HttpReply, TransportError> {
            self.submits.lock().unwrap().push(request.id.to_string());
            Ok(HttpReply {
                status: self.publish_status,
                body: String::new(),
            })
        }
    }

    struct Passing;
    impl Validator for Passing {
        fn validate(&self, _: &ArtifactId, _: &Path) -> ValidationReport {
            ValidationReport::default()
        }
    }

    /// Panics for artifacts named `boom`; tracks peak concurrency.
    struct Tracking {
        active: AtomicUsize,
        peak: AtomicUsize,
    }
    impl Validator for Tracking {
        fn validate(&self, id: &ArtifactId, _: &Path) -> ValidationReport {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            if id.name == "boom" {
                panic!("validator blew up");
            }
            ValidationReport::default()
        }
    }

    struct Body;
    impl Packager for Body {
        fn package(
            &self,
            _: &ChangeRecord,
            _: &Path,
        ) -> Result<Value, crate::error::PackageError> {
            Ok(Value::Null)
        }
    }

    fn ctx(registry: Registry, validator: Arc<dyn Validator>) -> (WorkerContext, Arc<Registry>) {
        let registry = Arc::new(registry);
        let ctx = WorkerContext {
            repo_root: PathBuf::from("/nonexistent"),
            registry: Some(registry.clone()),
            validator,
            packager: Arc::new(Body),
            probe: true,
            dry_run: false,
        };
        (ctx, registry)
    }

    fn registry(lookup_status: u16, publish_status: u16) -> Registry {
        Registry {
            lookup_status,
            publish_status,
            submits: Mutex::new(Vec::new()),
        }
    }

    fn change(id: &str) -> ChangeRecord {
        ChangeRecord {
            id: id.parse().unwrap(),
            latest_commit: CommitRef::from("c5"),
        }
    }

    #[test]
    fn probe_hit_skips_publish() {
        let (ctx, registry) = ctx(registry(200, 201), Arc::new(Passing));
        let outcome = process(&ctx, &change("policies/a/v1.0.0"));
        assert_eq!(
            outcome.status,
            ArtifactStatus::Delivered {
                via: DeliveryPath::RemoteExists
            }
        );
        assert!(registry.submits.lock().unwrap().is_empty());
    }

    #[test]
    fn inconclusive_probe_falls_through_with_warning() {
        let (ctx, _) = ctx(registry(503, 201), Arc::new(Passing));
        let outcome = process(&ctx, &change("policies/a/v1.0.0"));
        assert!(outcome.status.is_success());
        assert!(outcome.warnings[0].contains("503"));
    }

    #[test]
    fn dry_run_never_publishes() {
        let (mut ctx, registry) = ctx(registry(404, 201), Arc::new(Passing));
        ctx.dry_run = true;
        let outcome = process(&ctx, &change("policies/a/v1.0.0"));
        assert_eq!(outcome.status, ArtifactStatus::WouldPublish);
        assert!(registry.submits.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_is_bounded_sorted_and_survives_panics() {
        let tracking = Arc::new(Tracking {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (ctx, _) = ctx(registry(404, 201), tracking.clone());
        let pending = vec![
            change("policies/e/v1.0.0"),
            change("policies/boom/v1.0.0"),
            change("policies/c/v1.0.0"),
            change("policies/a/v1.0.0"),
            change("policies/d/v1.0.0"),
        ];

        let outcomes = run_pool(ctx, pending, 2).await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.id.name.as_str()).collect();
        assert_eq!(names, vec!["a", "boom", "c", "d", "e"]);
        assert!(matches!(
            outcomes[1].status,
            ArtifactStatus::PublishFailed { .. }
        ));
        assert!(outcomes
            .iter()
            .filter(|o| o.id.name != "boom")
            .all(|o| o.status.is_success()));
        assert!(tracking.peak.load(Ordering::SeqCst) <= 2);
    }
}
