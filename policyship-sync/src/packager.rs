//! Packaging: builds the publish request body for an artifact.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use policyship_core::ChangeRecord;

use crate::error::{io_err, PackageError};

pub trait Packager: Send + Sync {
    fn package(&self, change: &ChangeRecord, dir: &Path) -> Result<Value, PackageError>;
}

/// Describes an artifact by its file manifest.
///
/// Body shape:
///
/// ```json
/// { "collection": "policies", "name": "a", "version": "v1.0.0",
///   "commit": "…", "digest": "…",
///   "files": [{ "path": "src/main.go", "sha256": "…", "size": 12 }] }
/// ```
///
/// `digest` hashes the sorted `path:sha256` lines, so it changes with any file
/// content or name and never with traversal order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestPackager;

#[derive(Debug, Serialize)]
struct FileEntry {
    path: String,
    sha256: String,
    size: u64,
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PackageError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// `/`-separated path of `path` relative to `root`.
fn manifest_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl Packager for ManifestPackager {
    fn package(&self, change: &ChangeRecord, dir: &Path) -> Result<Value, PackageError> {
        let mut paths = Vec::new();
        collect_files(dir, &mut paths)?;
        if paths.is_empty() {
            return Err(PackageError::Empty {
                dir: dir.to_path_buf(),
            });
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
            files.push(FileEntry {
                path: manifest_path(dir, path),
                sha256: hex::encode(Sha256::digest(&bytes)),
                size: bytes.len() as u64,
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha256::new();
        for file in &files {
            hasher.update(format!("{}:{}\n", file.path, file.sha256).as_bytes());
        }

        let id = &change.id;
        Ok(json!({
            "collection": id.collection,
            "name": id.name,
            "version": id.version.to_string(),
            "commit": change.latest_commit.0,
            "digest": hex::encode(hasher.finalize()),
            "files": files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policyship_core::CommitRef;
    use std::fs;
    use tempfile::TempDir;

    fn change() -> ChangeRecord {
        ChangeRecord {
            id: "policies/a/v1.0.0".parse().unwrap(),
            latest_commit: CommitRef::from("c5"),
        }
    }

    #[test]
    fn manifest_lists_files_sorted_with_hashes() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/main.go"), "package a\n").unwrap();
        fs::write(tmp.path().join("policy.yaml"), "name: a\n").unwrap();

        let body = ManifestPackager.package(&change(), tmp.path()).unwrap();
        assert_eq!(body["name"], "a");
        assert_eq!(body["version"], "v1.0.0");
        assert_eq!(body["commit"], "c5");
        let paths: Vec<&str> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["policy.yaml", "src/main.go"]);
        assert_eq!(body["files"][0]["size"], 8);
    }

    #[test]
    fn digest_tracks_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "one").unwrap();
        let first = ManifestPackager.package(&change(), tmp.path()).unwrap();
        let again = ManifestPackager.package(&change(), tmp.path()).unwrap();
        fs::write(tmp.path().join("a.txt"), "two").unwrap();
        let changed = ManifestPackager.package(&change(), tmp.path()).unwrap();
        assert_eq!(first["digest"], again["digest"]);
        assert_ne!(first["digest"], changed["digest"]);
    }

    #[test]
    fn empty_or_missing_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            ManifestPackager.package(&change(), tmp.path()),
            Err(PackageError::Empty { .. })
        ));
        assert!(matches!(
            ManifestPackager.package(&change(), &tmp.path().join("gone")),
            Err(PackageError::Io { .. })
        ));
    }
}
