//! # Correction Store Module
//!
//! Persists operator-confirmed corrections (raw recognition string to
//! intended string) across runs. The on-disk layout is a single flat JSON
//! object mapping raw keys to corrected values; it must round-trip exactly.
//!
//! Corrections are rare, human-triggered events, so every recorded
//! correction is flushed synchronously with an atomic write-then-rename.
//! A mutex enforces single-writer discipline: each record fully completes
//! (merge, serialize, persist) before another is accepted, so concurrent
//! solving attempts cannot lose each other's updates.

use crate::errors::{SolverError, SolverResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Learned correction table: raw recognition string to corrected string.
pub type CorrectionTable = HashMap<String, String>;

/// Durable store for learned corrections.
#[derive(Debug)]
pub struct CorrectionStore {
    path: PathBuf,
    table: Mutex<CorrectionTable>,
}

impl CorrectionStore {
    /// Open the store at `path`, loading any existing table.
    ///
    /// A missing file is an empty table, not an error; first-run processes
    /// have nothing learned yet.
    pub fn open<P: AsRef<Path>>(path: P) -> SolverResult<Self> {
        let path = path.as_ref().to_path_buf();
        let table = Self::load_from(&path)?;

        info!(
            path = %path.display(),
            entries = table.len(),
            "Opened correction store"
        );

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    fn load_from(path: &Path) -> SolverResult<CorrectionTable> {
        if !path.exists() {
            return Ok(CorrectionTable::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            SolverError::Persistence(format!(
                "Failed to read correction table {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            SolverError::Persistence(format!(
                "Corrupt correction table {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Snapshot of the in-memory table.
    ///
    /// The in-memory table is authoritative during a run; the snapshot is a
    /// cheap clone of a small map, taken so the correction layer never
    /// holds the store lock while a write is in flight.
    pub fn table(&self) -> CorrectionTable {
        self.table.lock().clone()
    }

    /// Record an operator-confirmed correction and flush it to disk.
    ///
    /// A correction equal to its raw string teaches nothing and is a no-op.
    /// The write completes (merge, serialize, rename) under the store lock
    /// before the call returns; a persistence failure leaves the previous
    /// on-disk table intact.
    pub fn record_correction(&self, raw: &str, corrected: &str) -> SolverResult<()> {
        if raw == corrected {
            debug!(%raw, "Correction matches raw text, nothing to learn");
            return Ok(());
        }

        let mut table = self.table.lock();
        table.insert(raw.to_string(), corrected.to_string());
        Self::persist(&self.path, &table)?;

        info!(%raw, %corrected, entries = table.len(), "Recorded correction");
        Ok(())
    }

    /// Flush the in-memory table to disk.
    pub fn save(&self) -> SolverResult<()> {
        let table = self.table.lock();
        Self::persist(&self.path, &table)
    }

    /// Atomic write-then-rename so a failed write never truncates the
    /// existing table.
    fn persist(path: &Path, table: &CorrectionTable) -> SolverResult<()> {
        let serialized = serde_json::to_string(table)?;

        let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match directory {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new_in("."),
        }
        .map_err(|e| {
            SolverError::Persistence(format!("Failed to create temporary file: {}", e))
        })?;

        use std::io::Write;
        tmp.write_all(serialized.as_bytes()).map_err(|e| {
            SolverError::Persistence(format!("Failed to write correction table: {}", e))
        })?;

        tmp.persist(path).map_err(|e| {
            SolverError::Persistence(format!(
                "Failed to replace correction table {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty_table() {
        let dir = tempdir().unwrap();
        let store = CorrectionStore::open(dir.path().join("corrections.json")).unwrap();
        assert!(store.table().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        let store = CorrectionStore::open(&path).unwrap();
        store.record_correction("O5+S2", "65+52").unwrap();
        store.record_correction("Z*3", "2*3").unwrap();
        drop(store);

        let reloaded = CorrectionStore::open(&path).unwrap();
        let table = reloaded.table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("O5+S2").map(String::as_str), Some("65+52"));
        assert_eq!(table.get("Z*3").map(String::as_str), Some("2*3"));
    }

    #[test]
    fn test_identity_correction_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        let store = CorrectionStore::open(&path).unwrap();
        store.record_correction("12+7", "12+7").unwrap();

        assert!(store.table().is_empty());
        // Nothing learned, so nothing was flushed either.
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_table_surfaces_persistence_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrections.json");
        fs::write(&path, "{not json").unwrap();

        match CorrectionStore::open(&path) {
            Err(SolverError::Persistence(_)) => {}
            other => panic!("expected persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_recorded_correction_overwrites_previous() {
        let dir = tempdir().unwrap();
        let store = CorrectionStore::open(dir.path().join("corrections.json")).unwrap();

        store.record_correction("O5", "05").unwrap();
        store.record_correction("O5", "65").unwrap();

        assert_eq!(store.table().get("O5").map(String::as_str), Some("65"));
    }

    #[test]
    fn test_persisted_layout_is_flat_json_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        let store = CorrectionStore::open(&path).unwrap();
        store.record_correction("O5+S2", "65+52").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value, serde_json::json!({"O5+S2": "65+52"}));
    }
}
