//! Stress helpers for concurrent collection access.

use rozsdb_core::{Collection, ObjectId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let secs = duration.as_secs_f64();
        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second: if secs > 0.0 { total as f64 / secs } else { 0.0 },
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct document ids.
    pub document_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            document_count: 100,
        }
    }
}

fn stress_id(n: usize) -> ObjectId {
    ObjectId::parse(&format!("stress{n}")).expect("valid id")
}

/// Runs concurrent upserts, reads and deletes against one collection.
///
/// Each thread cycles write, read, read, delete over a shared id space.
pub fn stress_mixed_operations(collection: Arc<Collection>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let collection = Arc::clone(&collection);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;
            let document_count = config.document_count.max(1);

            thread::spawn(move || {
                for i in 0..operations {
                    let id = stress_id((t * operations + i) % document_count);
                    let ok = match i % 4 {
                        0 => collection
                            .insert_or_update(Some(id), &format!(r#"{{"thread":{t},"op":{i}}}"#))
                            .is_ok(),
                        3 => collection.delete(&id).is_ok(),
                        _ => collection.find_by_id(&id).is_ok(),
                    };
                    let counter = if ok { &successful } else { &failed };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
