//! Durable batch partition and cursor
//!
//! The population of entity keys is partitioned once into contiguous,
//! ordered batches and written to a JSON snapshot file together with a
//! cursor. Each run processes the batch under the cursor and advances it
//! modulo the batch count, so successive cron invocations walk the whole
//! population and wrap around. The file is human-inspectable on purpose:
//! operators can see exactly which batch runs next.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{EngineError, Result};

/// Durable partition of the population plus the rotation cursor.
///
/// `batches` is keyed by the stringified batch index ("0".."N-1"), each
/// value an ordered list of entity keys. Concatenating all batches in
/// index order reproduces the population in its generation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub batch_size: usize,
    pub total_batches: usize,
    pub batches: BTreeMap<String, Vec<String>>,
    pub current_batch_index: usize,
}

impl BatchSnapshot {
    /// Partition `population` into contiguous chunks of `batch_size`
    /// (the last chunk may be shorter), cursor reset to 0.
    pub fn build(population: &[String], batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(EngineError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let mut batches = BTreeMap::new();
        for (index, chunk) in population.chunks(batch_size).enumerate() {
            batches.insert(index.to_string(), chunk.to_vec());
        }

        Ok(Self {
            batch_size,
            total_batches: batches.len(),
            batches,
            current_batch_index: 0,
        })
    }

    /// Advance the cursor by one, wrapping modulo `total_batches`.
    pub fn advance(&mut self) {
        if self.total_batches > 0 {
            self.current_batch_index = (self.current_batch_index + 1) % self.total_batches;
        }
    }
}

/// Reads and writes a [`BatchSnapshot`] at a fixed path.
pub struct BatchStore {
    path: PathBuf,
}

impl BatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Generate and persist a fresh snapshot from `population`.
    ///
    /// Destructive: replaces any previous partition and resets the cursor.
    /// Callers only invoke this when no snapshot exists or on explicit
    /// operator action.
    pub fn generate(&self, population: &[String], batch_size: usize) -> Result<BatchSnapshot> {
        let snapshot = BatchSnapshot::build(population, batch_size)?;
        self.persist(&snapshot)?;
        info!(
            total_batches = snapshot.total_batches,
            batch_size,
            path = %self.path.display(),
            "saved batch snapshot"
        );
        Ok(snapshot)
    }

    /// Load the snapshot, failing with `MissingBatchFile` when absent.
    pub fn load(&self) -> Result<BatchSnapshot> {
        if !self.path.exists() {
            return Err(EngineError::MissingBatchFile(self.path.clone()));
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Resolve the batch under the cursor.
    ///
    /// A missing index key means the snapshot is corrupt or the population
    /// shrank under it; per policy the cursor is reset to 0 and persisted,
    /// and the run reports failure without processing anything.
    pub fn current_batch<'a>(&self, snapshot: &'a mut BatchSnapshot) -> Result<&'a [String]> {
        let index = snapshot.current_batch_index;
        if !snapshot.batches.contains_key(&index.to_string()) {
            warn!(
                index,
                total_batches = snapshot.total_batches,
                "cursor points at a missing batch; resetting to 0"
            );
            snapshot.current_batch_index = 0;
            self.persist(snapshot)?;
            return Err(EngineError::InvalidCursor {
                index,
                total_batches: snapshot.total_batches,
            });
        }
        // Checked above; the borrow is split so the reset path can mutate.
        Ok(snapshot
            .batches
            .get(&index.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Persist the snapshot with an atomic replace, so the file is valid
    /// JSON after every write even if the process dies mid-run.
    pub fn persist(&self, snapshot: &BatchSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn population(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("sub_{i:03}")).collect()
    }

    fn store_in(dir: &TempDir) -> BatchStore {
        BatchStore::new(dir.path().join("batches.json"))
    }

    #[test]
    fn partition_covers_population_in_order() {
        for (pop_size, batch_size) in [(0, 3), (1, 3), (9, 3), (10, 3), (11, 3), (5, 100)] {
            let population = population(pop_size);
            let snapshot = BatchSnapshot::build(&population, batch_size).unwrap();

            assert_eq!(snapshot.total_batches, pop_size.div_ceil(batch_size));

            let mut rebuilt = Vec::new();
            for i in 0..snapshot.total_batches {
                rebuilt.extend(snapshot.batches[&i.to_string()].iter().cloned());
            }
            assert_eq!(rebuilt, population, "P={pop_size} B={batch_size}");
        }
    }

    #[test]
    fn zero_batch_size_is_a_config_error() {
        assert!(matches!(
            BatchSnapshot::build(&population(3), 0),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn concrete_five_entity_scenario() {
        let population: Vec<String> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut snapshot = BatchSnapshot::build(&population, 2).unwrap();

        assert_eq!(snapshot.total_batches, 3);
        assert_eq!(snapshot.batches["0"], vec!["a", "b"]);
        assert_eq!(snapshot.batches["1"], vec!["c", "d"]);
        assert_eq!(snapshot.batches["2"], vec!["e"]);
        assert_eq!(snapshot.current_batch_index, 0);

        snapshot.advance();
        assert_eq!(snapshot.current_batch_index, 1);
        snapshot.advance();
        snapshot.advance();
        assert_eq!(snapshot.current_batch_index, 0, "wraps after three runs");
    }

    #[test]
    fn advance_wraps_after_total_batches_steps() {
        let mut snapshot = BatchSnapshot::build(&population(10), 3).unwrap();
        let start = snapshot.current_batch_index;
        for _ in 0..snapshot.total_batches {
            snapshot.advance();
        }
        assert_eq!(snapshot.current_batch_index, start);
    }

    #[test]
    fn advance_on_empty_population_is_a_no_op() {
        let mut snapshot = BatchSnapshot::build(&[], 4).unwrap();
        assert_eq!(snapshot.total_batches, 0);
        snapshot.advance();
        assert_eq!(snapshot.current_batch_index, 0);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.load(),
            Err(EngineError::MissingBatchFile(_))
        ));
    }

    #[test]
    fn generate_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.generate(&population(7), 2).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.total_batches, 4);
        assert_eq!(loaded.batch_size, 2);
        assert_eq!(loaded.current_batch_index, 0);
    }

    #[test]
    fn persisted_file_is_valid_json() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.generate(&population(4), 2).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["batch_size"], 2);
        assert_eq!(value["total_batches"], 2);
        assert!(value["batches"].is_object());
    }

    #[test]
    fn invalid_cursor_resets_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut snapshot = store.generate(&population(6), 2).unwrap();
        snapshot.current_batch_index = 42;

        let err = store.current_batch(&mut snapshot).unwrap_err();
        assert!(matches!(err, EngineError::InvalidCursor { index: 42, .. }));
        assert_eq!(snapshot.current_batch_index, 0);

        // The reset reached disk, so the next run starts clean.
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.current_batch_index, 0);
    }

    #[test]
    fn current_batch_returns_cursor_slice() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut snapshot = store.generate(&population(5), 2).unwrap();
        snapshot.current_batch_index = 2;
        let batch = store.current_batch(&mut snapshot).unwrap();
        assert_eq!(batch, &["sub_004".to_string()]);
    }
}
