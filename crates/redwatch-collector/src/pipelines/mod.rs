// Pipelines
//
// Three runs parameterized over the same engine: hot posts and activity
// snapshots walk the batch snapshot file with a rotating cursor; the meta
// update draws its population from the database instead. All three share
// the guard, the limiter, the fan-out collector, and the summary flow.
//
// Per-entity and per-write failures are absorbed into counts; only
// structural problems (missing/corrupt batch file, invalid cursor,
// unreachable database, failed authentication) abort a run. The cursor
// advances even when entities failed — a partially-failed batch is still
// a processed batch.

pub mod hot_posts;
pub mod meta_update;
pub mod snapshot;

pub use hot_posts::HotPostsPipeline;
pub use meta_update::MetaUpdatePipeline;
pub use snapshot::SnapshotPipeline;

use tracing::{error, info};

use crate::engine::{BatchSnapshot, BatchStore};

/// The resolved work for one run of a batch-file pipeline.
pub(crate) struct CurrentBatch {
    pub snapshot: BatchSnapshot,
    pub keys: Vec<String>,
    /// 1-based position for logs and notifications.
    pub position: usize,
}

/// Load the snapshot and resolve the batch under the cursor.
pub(crate) fn load_current_batch(store: &BatchStore) -> crate::engine::Result<CurrentBatch> {
    let mut snapshot = store.load()?;
    let keys = store.current_batch(&mut snapshot)?.to_vec();
    let position = snapshot.current_batch_index + 1;
    info!(
        batch = position,
        total_batches = snapshot.total_batches,
        subreddits = keys.len(),
        "processing batch"
    );
    Ok(CurrentBatch {
        snapshot,
        keys,
        position,
    })
}

/// Advance the cursor and persist it.
///
/// Called unconditionally at the end of a run: partial per-entity
/// failures do not hold a batch back. A persist failure is logged but
/// does not fail the run either — the collection work is already done.
pub(crate) fn advance_and_persist(store: &BatchStore, snapshot: &mut BatchSnapshot) {
    snapshot.advance();
    if let Err(err) = store.persist(snapshot) {
        error!(
            error = %err,
            path = %store.path().display(),
            "failed to persist advanced cursor"
        );
    }
}
