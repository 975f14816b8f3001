//! JSON snapshots of the working set.
//!
//! A snapshot is the declared columns plus every row, tagged with a format
//! version. Loading a snapshot written by a different version is an error;
//! there is no migration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{CanonicalRow, DynamicColumn, StoreError, WorkingSet};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub columns: Vec<DynamicColumn>,
    pub rows: Vec<CanonicalRow>,
}

impl WorkingSet {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            columns: self.columns(),
            rows: self.rows(),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Self::from_parts(snapshot.columns, snapshot.rows)
    }

    /// Write the snapshot next to `path` and rename it into place.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        tracing::debug!(
            path = %path.display(),
            rows = snapshot.rows.len(),
            columns = snapshot.columns.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load a snapshot; a missing file yields an empty working set.
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }
}
