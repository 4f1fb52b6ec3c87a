use std::sync::atomic::{AtomicU64, Ordering};

/// Counters reported by the trie storage layer
///
/// Implementations must never block or fail.
pub trait MerkleMetrics: Send + Sync {
    /// A node id was computed
    fn hash_calculated(&self);

    /// A node was read from the backing store
    fn database_node_read(&self);

    /// A node write or delete was staged for the backing store
    fn database_node_write(&self);

    /// An intermediate node lookup was served by the cache
    fn intermediate_node_cache_hit(&self);

    /// An intermediate node lookup fell through to the backing store
    fn intermediate_node_cache_miss(&self);
}

/// Atomic counter implementation of [`MerkleMetrics`]
#[derive(Debug, Default)]
pub struct Metrics {
    hashes_calculated: AtomicU64,
    database_node_reads: AtomicU64,
    database_node_writes: AtomicU64,
    intermediate_node_cache_hits: AtomicU64,
    intermediate_node_cache_misses: AtomicU64,
}

/// Point-in-time copy of the counters in [`Metrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hashes_calculated: u64,
    pub database_node_reads: u64,
    pub database_node_writes: u64,
    pub intermediate_node_cache_hits: u64,
    pub intermediate_node_cache_misses: u64,
}

impl Metrics {
    /// Create a new set of zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hashes_calculated: self.hashes_calculated.load(Ordering::Relaxed),
            database_node_reads: self.database_node_reads.load(Ordering::Relaxed),
            database_node_writes: self.database_node_writes.load(Ordering::Relaxed),
            intermediate_node_cache_hits: self.intermediate_node_cache_hits.load(Ordering::Relaxed),
            intermediate_node_cache_misses: self.intermediate_node_cache_misses.load(Ordering::Relaxed),
        }
    }
}

impl MerkleMetrics for Metrics {
    fn hash_calculated(&self) {
        self.hashes_calculated.fetch_add(1, Ordering::Relaxed);
    }

    fn database_node_read(&self) {
        self.database_node_reads.fetch_add(1, Ordering::Relaxed);
    }

    fn database_node_write(&self) {
        self.database_node_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn intermediate_node_cache_hit(&self) {
        self.intermediate_node_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn intermediate_node_cache_miss(&self) {
        self.intermediate_node_cache_misses.fetch_add(1, Ordering::Relaxed);
    }
}
