//! Store operation counters
//!
//! - Counters only, monotonic
//! - Reset only when the store is constructed
//! - Relaxed atomics; exact per counter, not a consistent cut across counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one store instance
#[derive(Debug, Default)]
pub struct StoreMetrics {
    adds: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    soft_remove_failures: AtomicU64,
    reads: AtomicU64,
    read_misses: AtomicU64,
    records_recovered: AtomicU64,
}

impl StoreMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// A write that appended a new record
    pub fn increment_adds(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    /// A write that replaced an indexed record
    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    /// A remove the journal accepted
    pub fn increment_removes(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    /// A remove the journal rejected as invalid for its state
    pub fn increment_soft_remove_failures(&self) {
        self.soft_remove_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A read, hit or miss
    pub fn increment_reads(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// A read that found nothing
    pub fn increment_read_misses(&self) {
        self.read_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records indexed during recovery
    pub fn add_records_recovered(&self, count: u64) {
        self.records_recovered.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            soft_remove_failures: self.soft_remove_failures.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            read_misses: self.read_misses.load(Ordering::Relaxed),
            records_recovered: self.records_recovered.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`StoreMetrics`] at one moment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetricsSnapshot {
    pub adds: u64,
    pub updates: u64,
    pub removes: u64,
    pub soft_remove_failures: u64,
    pub reads: u64,
    pub read_misses: u64,
    pub records_recovered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(StoreMetrics::new().snapshot(), StoreMetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = StoreMetrics::new();
        metrics.increment_adds();
        metrics.increment_adds();
        metrics.increment_updates();
        metrics.increment_removes();
        metrics.increment_soft_remove_failures();
        metrics.increment_reads();
        metrics.increment_read_misses();
        metrics.add_records_recovered(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.adds, 2);
        assert_eq!(snapshot.updates, 1);
        assert_eq!(snapshot.removes, 1);
        assert_eq!(snapshot.soft_remove_failures, 1);
        assert_eq!(snapshot.reads, 1);
        assert_eq!(snapshot.read_misses, 1);
        assert_eq!(snapshot.records_recovered, 7);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = StoreMetrics::new();
        metrics.increment_reads();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["reads"], 1);
        assert_eq!(json["adds"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(StoreMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.increment_adds();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().adds, 800);
    }
}
