use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;

/// File name of the persisted ledger inside the ledger directory
pub const LEDGER_FILENAME: &str = "run_ledger.json";

/// On-disk form of the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub succeeded: Vec<PathBuf>,
    #[serde(default)]
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct Sets {
    succeeded: BTreeSet<PathBuf>,
    failed: BTreeSet<PathBuf>,
}

/// Success/failure record of destination paths, shared by all download tasks
///
/// A path is in at most one of the two sets: recording an outcome removes the
/// path from the other set.
#[derive(Debug)]
pub struct RunLedger {
    path: PathBuf,
    sets: Mutex<Sets>,
}

impl RunLedger {
    /// Create an empty ledger persisted at `dir/run_ledger.json`
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(LEDGER_FILENAME),
            sets: Mutex::new(Sets::default()),
        }
    }

    /// Load the ledger of previous runs, or start empty if none exists
    pub fn load(dir: &Path) -> Result<Self, LedgerError> {
        let ledger = Self::new(dir);
        if !ledger.path.exists() {
            return Ok(ledger);
        }

        let content =
            std::fs::read_to_string(&ledger.path).map_err(|e| LedgerError::ReadFailed {
                path: ledger.path.clone(),
                source: e,
            })?;
        let record: LedgerRecord =
            serde_json::from_str(&content).map_err(|e| LedgerError::JsonParseFailed {
                path: ledger.path.clone(),
                source: e,
            })?;

        {
            let mut sets = ledger.lock();
            sets.succeeded.extend(record.succeeded);
            for path in record.failed {
                if !sets.succeeded.contains(&path) {
                    sets.failed.insert(path);
                }
            }
        }

        Ok(ledger)
    }

    fn lock(&self) -> MutexGuard<'_, Sets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_success(&self, destination: &Path) {
        let mut sets = self.lock();
        sets.failed.remove(destination);
        sets.succeeded.insert(destination.to_path_buf());
    }

    pub fn record_failure(&self, destination: &Path) {
        let mut sets = self.lock();
        sets.succeeded.remove(destination);
        sets.failed.insert(destination.to_path_buf());
    }

    pub fn succeeded(&self) -> Vec<PathBuf> {
        self.lock().succeeded.iter().cloned().collect()
    }

    pub fn failed(&self) -> Vec<PathBuf> {
        self.lock().failed.iter().cloned().collect()
    }

    /// Snapshot of both sets
    pub fn record(&self) -> LedgerRecord {
        let sets = self.lock();
        LedgerRecord {
            updated_at: Some(Utc::now().to_rfc3339()),
            succeeded: sets.succeeded.iter().cloned().collect(),
            failed: sets.failed.iter().cloned().collect(),
        }
    }

    /// Write the current state to disk, replacing the previous file
    pub fn flush(&self) -> Result<(), LedgerError> {
        let record = self.record();
        let json = serde_json::to_string_pretty(&record)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(&self.path, json).map_err(|e| LedgerError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(
            path = %self.path.display(),
            succeeded = record.succeeded.len(),
            failed = record.failed.len(),
            "Flushed run ledger"
        );
        Ok(())
    }
}
