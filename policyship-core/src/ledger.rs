//! Ledger store: the baseline pointer and the delivery record map.
//!
//! # Storage layout
//!
//! ```text
//! <repo>/.policyship/
//!   baseline          (single commit ref, plain text)
//!   deliveries.json   (artifact id -> DeliveryRecord, keys ordered)
//! ```
//!
//! Both files are committed back to version control as the audit trail. The
//! ledger is read once at the start of a run and written once at the end.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, LedgerError};
use crate::types::{ArtifactId, CommitRef, DeliveryRecord};

pub const LEDGER_DIR: &str = ".policyship";
pub const BASELINE_FILE: &str = "baseline";
pub const DELIVERIES_FILE: &str = "deliveries.json";

/// Delivery records keyed by artifact id. Iteration order is the id order.
pub type DeliveryMap = BTreeMap<ArtifactId, DeliveryRecord>;

/// In-memory ledger value. Replaced wholesale at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// Commit up to which the source tree is fully reconciled. `None` before
    /// the first fully successful run.
    pub baseline: Option<CommitRef>,
    pub deliveries: DeliveryMap,
}

impl Ledger {
    pub fn record(&self, id: &ArtifactId) -> Option<&DeliveryRecord> {
        self.deliveries.get(id)
    }
}

/// `<dir>/baseline`
pub fn baseline_path_at(dir: &Path) -> PathBuf {
    dir.join(BASELINE_FILE)
}

/// `<dir>/deliveries.json`
pub fn deliveries_path_at(dir: &Path) -> PathBuf {
    dir.join(DELIVERIES_FILE)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the ledger stored in `dir`.
///
/// Missing files mean a first run: no baseline, no deliveries.
pub fn load_at(dir: &Path) -> Result<Ledger, LedgerError> {
    let baseline_path = baseline_path_at(dir);
    let baseline = match read_optional(&baseline_path)? {
        Some(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| CommitRef::from(trimmed))
        }
        None => None,
    };

    let deliveries_path = deliveries_path_at(dir);
    let deliveries = match read_optional(&deliveries_path)? {
        Some(text) if !text.trim().is_empty() => {
            serde_json::from_str::<DeliveryMap>(&text).map_err(|source| LedgerError::Parse {
                path: deliveries_path.clone(),
                source,
            })?
        }
        _ => DeliveryMap::new(),
    };

    Ok(Ledger {
        baseline,
        deliveries,
    })
}

fn read_optional(path: &Path) -> Result<Option<String>, LedgerError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

// ---------------------------------------------------------------------------
// Save (all-or-nothing)
// ---------------------------------------------------------------------------

/// Persist `ledger` into `dir` as one all-or-nothing write.
///
/// Write flow:
/// 1. Stage `deliveries.json.tmp` and `baseline.tmp`; on failure remove both.
/// 2. Rename deliveries into place.
/// 3. Rename baseline into place; on failure restore the previous deliveries.
///
/// Deliveries land before the baseline, so an interruption between the two
/// renames leaves extra records under the old baseline, which is a valid ledger.
pub fn save_at(dir: &Path, ledger: &Ledger) -> Result<(), LedgerError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let deliveries_path = deliveries_path_at(dir);
    let baseline_path = baseline_path_at(dir);
    let deliveries_tmp = deliveries_path.with_extension("json.tmp");
    let baseline_tmp = baseline_path.with_extension("tmp");

    let mut json = serde_json::to_string_pretty(&ledger.deliveries)?;
    json.push('\n');
    let baseline = ledger
        .baseline
        .as_ref()
        .map(|c| format!("{c}\n"))
        .unwrap_or_default();

    let staged = std::fs::write(&deliveries_tmp, &json)
        .map_err(|e| io_err(&deliveries_tmp, e))
        .and_then(|()| std::fs::write(&baseline_tmp, &baseline).map_err(|e| io_err(&baseline_tmp, e)));
    if let Err(err) = staged {
        discard(&[&deliveries_tmp, &baseline_tmp]);
        return Err(err);
    }

    let previous = match read_optional(&deliveries_path) {
        Ok(previous) => previous,
        Err(err) => {
            discard(&[&deliveries_tmp, &baseline_tmp]);
            return Err(err);
        }
    };

    if let Err(e) = std::fs::rename(&deliveries_tmp, &deliveries_path) {
        discard(&[&deliveries_tmp, &baseline_tmp]);
        return Err(io_err(&deliveries_path, e));
    }

    if let Err(e) = std::fs::rename(&baseline_tmp, &baseline_path) {
        discard(&[&baseline_tmp]);
        restore(&deliveries_path, previous.as_deref());
        return Err(io_err(&baseline_path, e));
    }

    Ok(())
}

fn discard(paths: &[&Path]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

/// Best-effort rollback of the deliveries file to its pre-save content.
fn restore(path: &Path, previous: Option<&str>) {
    match previous {
        Some(content) => {
            let tmp = path.with_extension("json.restore");
            if std::fs::write(&tmp, content).is_ok() {
                let _ = std::fs::rename(&tmp, path);
            }
            let _ = std::fs::remove_file(&tmp);
        }
        None => {
            let _ = std::fs::remove_file(path);
        }
    }
}
