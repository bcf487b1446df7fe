//! Reconciliation against a real `git` repository: artifact content is read
//! from the working copy, so runs must refuse a working copy that differs
//! from head. Tests return early when no `git` executable is available.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use policyship_core::{ledger, CommitRef};
use policyship_detector::{DetectError, GitHistory};
use policyship_sync::error::TransportError;
use policyship_sync::{
    Collaborators, HttpReply, ManifestPackager, PublishRequest, ReconcileError, Reconciler,
    RegistryClient, RunOptions, StructureValidator,
};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Policyship Test",
            "-c",
            "user.email=test@policyship.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(repo)
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn write(repo: &Path, rel: &str, content: &str) {
    let path = repo.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn commit(repo: &Path, message: &str) -> CommitRef {
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", message]);
    CommitRef::from(git(repo, &["rev-parse", "HEAD"]))
}

/// Registry that holds nothing and records every publish body.
#[derive(Default)]
struct RecordingRegistry {
    bodies: Mutex<Vec<serde_json::Value>>,
}

impl RegistryClient for RecordingRegistry {
    fn lookup(&self, _id: &policyship_core::ArtifactId) -> Result<u16, TransportError> {
        Ok(404)
    }

    fn submit(&self, request: &PublishRequest) -> Result<HttpReply, TransportError> {
        self.bodies.lock().unwrap().push(request.body.clone());
        Ok(HttpReply {
            status: 201,
            body: String::new(),
        })
    }
}

fn reconciler(repo: &Path, registry: Arc<RecordingRegistry>) -> Reconciler {
    Reconciler::new(
        repo,
        repo.join(".policyship"),
        vec!["policies".to_string()],
        Collaborators {
            history: Arc::new(GitHistory::new(repo)),
            registry: Some(registry),
            validator: Arc::new(StructureValidator::new(Vec::new())),
            packager: Arc::new(ManifestPackager),
        },
    )
}

/// Repo with `README.md` at c1 and `policies/x/v1.0.0/main.go` at c2.
fn repo_with_artifact() -> (TempDir, CommitRef, CommitRef) {
    let repo = TempDir::new().expect("tempdir");
    git(repo.path(), &["init", "-q"]);
    write(repo.path(), "README.md", "policies\n");
    let c1 = commit(repo.path(), "c1");
    write(repo.path(), "policies/x/v1.0.0/main.go", "package committed\n");
    let c2 = commit(repo.path(), "c2");
    (repo, c1, c2)
}

#[test]
fn uncommitted_edit_under_artifact_blocks_the_run() {
    if !git_available() {
        return;
    }
    let (repo, _, head) = repo_with_artifact();
    write(repo.path(), "policies/x/v1.0.0/main.go", "package UNCOMMITTED\n");

    let registry = Arc::new(RecordingRegistry::default());
    let err = reconciler(repo.path(), registry.clone())
        .run(&RunOptions::new(head.0.as_str(), "r1"))
        .unwrap_err();

    assert!(
        matches!(err, ReconcileError::Detect(DetectError::UncommittedChanges { .. })),
        "got: {err}"
    );
    assert!(registry.bodies.lock().unwrap().is_empty(), "nothing may be published");
    let ledger = ledger::load_at(&repo.path().join(".policyship")).unwrap();
    assert!(ledger.baseline.is_none());
    assert!(ledger.deliveries.is_empty());
}

#[test]
fn head_behind_the_checkout_blocks_the_run() {
    if !git_available() {
        return;
    }
    let (repo, _, c2) = repo_with_artifact();
    write(repo.path(), "policies/x/v1.0.0/main.go", "package newer\n");
    commit(repo.path(), "c3");

    let registry = Arc::new(RecordingRegistry::default());
    let err = reconciler(repo.path(), registry.clone())
        .run(&RunOptions::new(c2.0.as_str(), "r1"))
        .unwrap_err();

    match err {
        ReconcileError::Detect(DetectError::HeadNotCheckedOut { head, .. }) => assert_eq!(head, c2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.bodies.lock().unwrap().is_empty());
}

#[test]
fn clean_checkout_publishes_the_committed_content() {
    if !git_available() {
        return;
    }
    let (repo, _, head) = repo_with_artifact();
    // Outside every collection root, so it does not block the run.
    write(repo.path(), "NOTES.md", "scratch\n");

    let registry = Arc::new(RecordingRegistry::default());
    let report = reconciler(repo.path(), registry.clone())
        .run(&RunOptions::new("HEAD", "r1"))
        .expect("run");

    assert_eq!(report.baseline_after, Some(head));
    let bodies = registry.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let committed = git(repo.path(), &["show", "HEAD:policies/x/v1.0.0/main.go"]);
    assert_eq!(committed, "package committed");
    assert_eq!(bodies[0]["files"][0]["path"], "main.go");
    assert_eq!(bodies[0]["files"][0]["size"], "package committed\n".len());
}
