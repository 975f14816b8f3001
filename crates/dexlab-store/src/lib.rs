//! Dexlab Working-Set Store
//!
//! Holds the in-memory collection of canonical rows that ingestion fills and
//! commands edit:
//!
//! ```text
//! ┌──────────┐  append_batch   ┌──────────────┐  snapshot   ┌──────┐
//! │ Ingestor │ ──────────────► │ rows (Vec)   │ ──────────► │ json │
//! └──────────┘                 │ + id index   │             └──────┘
//! ┌──────────┐  update/delete  │ + columns    │  export     ┌──────┐
//! │ Commands │ ──────────────► │              │ ──────────► │ csv  │
//! └──────────┘                 └──────────────┘             └──────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Unique identity**: inserts upsert by `id`; two rows never share one.
//! - **Uniform dynamic fields**: every row carries exactly the declared
//!   dynamic columns, back-filled with the column type's default.
//! - **All-or-nothing bulk edits**: a patch is type-checked and every target
//!   id is verified before any row changes.

pub mod model;
pub mod snapshot;
pub mod tabular;

#[cfg(test)]
mod tests;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

pub use model::{
    column_id_from_label, split_list, BaseStats, CanonicalRow, ColumnKind, DynamicColumn, Field,
    FieldValue, Patch, Stat,
};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no row with id `{0}`")]
    UnknownRow(String),
    #[error("no column named `{0}`")]
    UnknownColumn(String),
    #[error("`{0}` cannot be edited")]
    ReadOnlyField(String),
    #[error("`{0}` is not a usable column id (empty or taken by a built-in field)")]
    ReservedColumn(String),
    #[error("cannot set {field} to {value}: expected {expected}")]
    InvalidPatch {
        field: String,
        value: String,
        expected: String,
    },
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Configuration
// ============================================================================

/// Where the CLI keeps the working set between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./dexlab.json"),
        }
    }
}

// ============================================================================
// Working set
// ============================================================================

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<CanonicalRow>,
    /// id -> position in `rows`
    index: HashMap<String, usize>,
    columns: Vec<DynamicColumn>,
}

impl Inner {
    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.id.clone(), pos))
            .collect();
    }

    /// Bring a row's dynamic map in line with the declared columns.
    fn conform(&self, row: &mut CanonicalRow) {
        row.dynamic
            .retain(|key, _| self.columns.iter().any(|c| &c.id == key));
        for column in &self.columns {
            row.dynamic
                .entry(column.id.clone())
                .or_insert_with(|| column.kind.default_value());
        }
    }

    /// Insert or overwrite by id. Returns true when the id was new.
    fn upsert(&mut self, mut row: CanonicalRow) -> bool {
        self.conform(&mut row);
        match self.index.get(&row.id) {
            Some(&pos) => {
                self.rows[pos] = row;
                false
            }
            None => {
                self.index.insert(row.id.clone(), self.rows.len());
                self.rows.push(row);
                true
            }
        }
    }

    fn update_many(&mut self, ids: &[String], patch: &Patch) -> Result<usize, StoreError> {
        let assignments = patch.resolve(&self.columns)?;
        let mut positions = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for id in ids {
            let pos = *self
                .index
                .get(id)
                .ok_or_else(|| StoreError::UnknownRow(id.clone()))?;
            if seen.insert(pos) {
                positions.push(pos);
            }
        }
        for pos in &positions {
            let row = &mut self.rows[*pos];
            for assignment in &assignments {
                row.assign(assignment);
            }
        }
        Ok(positions.len())
    }

    fn delete_many(&mut self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.rows.len();
        self.rows.retain(|row| !doomed.contains(row.id.as_str()));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn declare_column(&mut self, column: DynamicColumn) -> Result<bool, StoreError> {
        if column.is_reserved() {
            return Err(StoreError::ReservedColumn(column.id));
        }
        if self.columns.iter().any(|c| c.id == column.id) {
            return Ok(false);
        }
        let default = column.kind.default_value();
        for row in &mut self.rows {
            row.dynamic.insert(column.id.clone(), default.clone());
        }
        self.columns.push(column);
        Ok(true)
    }
}

/// Shared handle to the working set. Clones refer to the same rows.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    inner: Arc<RwLock<Inner>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a working set from previously saved columns and rows.
    pub fn from_parts(
        columns: Vec<DynamicColumn>,
        rows: Vec<CanonicalRow>,
    ) -> Result<Self, StoreError> {
        let set = Self::new();
        {
            let mut inner = set.inner.write();
            for column in columns {
                inner.declare_column(column)?;
            }
            for row in rows {
                inner.upsert(row);
            }
        }
        Ok(set)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }

    /// Copy of every row, in insertion order.
    pub fn rows(&self) -> Vec<CanonicalRow> {
        self.inner.read().rows.clone()
    }

    pub fn get(&self, id: &str) -> Option<CanonicalRow> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&pos| inner.rows[pos].clone())
    }

    pub fn columns(&self) -> Vec<DynamicColumn> {
        self.inner.read().columns.clone()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Drop every row and load `rows` instead. Columns are kept.
    pub fn replace_all(&self, rows: Vec<CanonicalRow>) {
        let mut inner = self.inner.write();
        inner.rows.clear();
        inner.index.clear();
        for row in rows {
            inner.upsert(row);
        }
        tracing::debug!(rows = inner.rows.len(), "working set replaced");
    }

    /// Upsert a batch by id. Returns how many ids were new.
    pub fn append_batch(&self, rows: Vec<CanonicalRow>) -> usize {
        let mut inner = self.inner.write();
        let mut added = 0;
        for row in rows {
            if inner.upsert(row) {
                added += 1;
            }
        }
        added
    }

    pub fn update_one(&self, id: &str, patch: &Patch) -> Result<(), StoreError> {
        self.inner
            .write()
            .update_many(&[id.to_string()], patch)
            .map(|_| ())
    }

    /// Apply `patch` to every id, or to none of them.
    pub fn update_many(&self, ids: &[String], patch: &Patch) -> Result<usize, StoreError> {
        self.inner.write().update_many(ids, patch)
    }

    /// Remove every listed id; unknown ids are ignored. Returns rows removed.
    pub fn delete_many(&self, ids: &[String]) -> usize {
        self.inner.write().delete_many(ids)
    }

    /// Declare a dynamic column and back-fill it on every row. Returns false
    /// (and touches nothing) when the id is already declared. An empty id, or
    /// one that names a built-in field, is rejected.
    pub fn declare_column(&self, column: DynamicColumn) -> Result<bool, StoreError> {
        let id = column.id.clone();
        let added = self.inner.write().declare_column(column)?;
        if added {
            tracing::debug!(column = %id, "dynamic column declared");
        }
        Ok(added)
    }

    /// Run `f` with exclusive access, so a read-then-write sequence sees no
    /// interleaved mutation.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let mut inner = self.inner.write();
        let mut tx = Transaction { inner: &mut *inner };
        f(&mut tx)
    }
}

/// Exclusive view of the working set handed out by [`WorkingSet::transaction`].
pub struct Transaction<'a> {
    inner: &'a mut Inner,
}

impl Transaction<'_> {
    pub fn rows(&self) -> &[CanonicalRow] {
        &self.inner.rows
    }

    pub fn columns(&self) -> &[DynamicColumn] {
        &self.inner.columns
    }

    pub fn update_many(&mut self, ids: &[String], patch: &Patch) -> Result<usize, StoreError> {
        self.inner.update_many(ids, patch)
    }

    pub fn delete_many(&mut self, ids: &[String]) -> usize {
        self.inner.delete_many(ids)
    }
}
