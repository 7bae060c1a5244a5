// Engine-level run behavior: batch rotation under partial failure,
// exercised with an in-memory fetch and writer in place of the API and
// database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{pin_mut, StreamExt};
use redwatch_collector::engine::{
    collect_batch, BatchStore, EngineError, FanOutConfig, RateLimiter, RunSummary,
};
use tempfile::TempDir;

fn population(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("r/sub_{i:02}")).collect()
}

fn fan_out() -> FanOutConfig {
    FanOutConfig {
        concurrency: 4,
        task_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn partial_failure_batch_still_advances_the_cursor() {
    let dir = TempDir::new().unwrap();
    let store = BatchStore::new(dir.path().join("batches.json"));

    // One batch of 10, of which 3 fail fetch.
    let mut snapshot = store.generate(&population(10), 10).unwrap();
    let keys = store.current_batch(&mut snapshot).unwrap().to_vec();
    assert_eq!(keys.len(), 10);

    let limiter = Arc::new(RateLimiter::bursty(100, Duration::from_secs(1)).unwrap());
    let mut summary = RunSummary::default();
    let mut written: HashMap<String, usize> = HashMap::new();

    {
        let stream = collect_batch(keys, limiter, fan_out(), |key| async move {
            let ordinal: usize = key["r/sub_".len()..].parse().unwrap();
            if ordinal % 3 == 1 {
                Err(redwatch_collector::reddit::FetchError::Network(
                    "connection reset".to_string(),
                ))
            } else {
                Ok(vec![format!("{key}/post")])
            }
        });
        pin_mut!(stream);

        while let Some(outcome) = stream.next().await {
            match outcome.result {
                Ok(items) => {
                    *written.entry(outcome.key).or_default() += items.len();
                    summary.record_items(items.len(), 0);
                    summary.record_success();
                }
                Err(_) => summary.record_failure(),
            }
        }
    }

    assert_eq!(summary.processed, 10);
    assert_eq!(summary.failed, 3, "ordinals 1, 4, 7 fail");
    assert_eq!(summary.succeeded, 7);
    assert_eq!(written.len(), 7);

    // The cursor moves on regardless of the failures.
    snapshot.advance();
    store.persist(&snapshot).unwrap();
    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.current_batch_index, 0, "single batch wraps to itself");
}

#[tokio::test]
async fn successive_runs_walk_all_batches_and_wrap() {
    let dir = TempDir::new().unwrap();
    let store = BatchStore::new(dir.path().join("batches.json"));
    store.generate(&population(5), 2).unwrap();

    let limiter = Arc::new(RateLimiter::bursty(100, Duration::from_secs(1)).unwrap());
    let mut processed_keys: Vec<String> = Vec::new();

    // Three runs cover batches 0, 1, 2; the cursor then wraps to 0.
    for expected_index in [0, 1, 2] {
        let mut snapshot = store.load().unwrap();
        assert_eq!(snapshot.current_batch_index, expected_index);

        let keys = store.current_batch(&mut snapshot).unwrap().to_vec();
        let stream = collect_batch(keys, Arc::clone(&limiter), fan_out(), |key| async move {
            Ok::<_, redwatch_collector::reddit::FetchError>(key)
        });
        pin_mut!(stream);
        while let Some(outcome) = stream.next().await {
            processed_keys.push(outcome.key);
        }

        snapshot.advance();
        store.persist(&snapshot).unwrap();
    }

    assert_eq!(store.load().unwrap().current_batch_index, 0);

    processed_keys.sort();
    let mut expected = population(5);
    expected.sort();
    assert_eq!(processed_keys, expected, "three runs cover the population");
}

#[tokio::test]
async fn corrupted_cursor_fails_structurally_without_processing() {
    let dir = TempDir::new().unwrap();
    let store = BatchStore::new(dir.path().join("batches.json"));

    let mut snapshot = store.generate(&population(4), 2).unwrap();
    snapshot.current_batch_index = 99;

    let err = store.current_batch(&mut snapshot).unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor { index: 99, .. }));

    // The reset persisted; the next run starts from batch 0.
    assert_eq!(store.load().unwrap().current_batch_index, 0);
}
