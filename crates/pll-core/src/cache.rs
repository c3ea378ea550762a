//! Partition Cache
//!
//! Materialized content of a derived PLL. The cache is a derived artifact:
//! it can always be rebuilt by walking lineage, so eviction never loses data.
//!
//! Two layers:
//! - the committed cache, holding every partition or none, so a PLL is never
//!   observably partially cached
//! - a staging table with one slot per partition index. Materializing a slot
//!   holds its lock, so concurrent callers for the same partition wait for
//!   and share a single computation while distinct partitions proceed in
//!   parallel.
//!
//! Every eviction bumps a generation counter; a cache run started before an
//! eviction can no longer commit.
//!
//! Thread-safe via interior mutability (parking_lot + DashMap).

use crate::error::{PllError, Result};
use crate::pll::ElementStream;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Partition reads served from materialized content
    pub hits: u64,
    /// Partition reads that had to recompute through lineage
    pub misses: u64,
    /// Partitions computed into memory
    pub materializations: u64,
    /// Number of times a complete cache was discarded
    pub evictions: u64,
}

impl CacheMetrics {
    /// Get hit rate as a percentage (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type Slot<T> = Arc<Mutex<Option<Arc<[T]>>>>;

/// Materialized partitions of one PLL.
pub struct PartitionCache<T> {
    /// Every partition in index order, or nothing
    committed: RwLock<Option<Arc<[Arc<[T]>]>>>,

    /// Per-partition materialization slots
    staging: DashMap<usize, Slot<T>>,

    /// Number of cache runs in flight (guards staging cleanup)
    runs: Mutex<usize>,

    /// Bumped on every eviction
    generation: AtomicU64,

    metrics: Mutex<CacheMetrics>,
}

impl<T> Default for PartitionCache<T> {
    fn default() -> Self {
        Self {
            committed: RwLock::new(None),
            staging: DashMap::new(),
            runs: Mutex::new(0),
            generation: AtomicU64::new(0),
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }
}

impl<T> PartitionCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every partition is materialized
    pub fn is_complete(&self) -> bool {
        self.committed.read().is_some()
    }

    /// Materialized content of a partition, if the cache is complete.
    ///
    /// Records a hit or a miss.
    pub fn get(&self, index: usize) -> Option<Arc<[T]>> {
        let found = self
            .committed
            .read()
            .as_ref()
            .and_then(|parts| parts.get(index).cloned());
        let mut metrics = self.metrics.lock();
        if found.is_some() {
            metrics.hits += 1;
        } else {
            metrics.misses += 1;
        }
        found
    }

    /// Partition sizes, if the cache is complete
    pub fn sizes(&self) -> Option<Vec<u64>> {
        self.committed
            .read()
            .as_ref()
            .map(|parts| parts.iter().map(|p| p.len() as u64).collect())
    }

    /// Current generation, as seen by a new cache run
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Get a snapshot of cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    /// Register a cache run and return the generation it belongs to.
    ///
    /// Every run must be closed with [`end_run`](Self::end_run).
    pub fn begin_run(&self) -> u64 {
        let mut runs = self.runs.lock();
        *runs += 1;
        self.generation()
    }

    /// Materialize a partition, computing it at most once across
    /// concurrent callers.
    ///
    /// Uses double-checked locking on the partition's staging slot: the
    /// first caller computes while later callers block on the slot and
    /// reuse its content.
    pub fn materialize<F>(&self, index: usize, compute: F) -> Result<Arc<[T]>>
    where
        F: FnOnce() -> Result<ElementStream<T>>,
    {
        // First check: complete cache (shared read lock)
        if let Some(rows) = self.committed_slot(index) {
            return Ok(rows);
        }

        // Clone the slot so the DashMap shard is not held while computing
        let slot = self
            .staging
            .entry(index)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut guard = slot.lock();

        // Second check: another caller may have filled the slot, or a
        // commit may have replaced staging meanwhile
        if let Some(rows) = guard.as_ref() {
            trace!(partition = index, "reusing staged partition");
            return Ok(rows.clone());
        }
        if let Some(rows) = self.committed_slot(index) {
            return Ok(rows);
        }

        let rows: Arc<[T]> = compute()?.collect();
        *guard = Some(rows.clone());
        drop(guard);
        self.metrics.lock().materializations += 1;

        // Outside a cache run nobody will commit this slot. The run count is
        // held across the removal so a run cannot start in between.
        let runs = self.runs.lock();
        if *runs == 0 {
            self.staging.remove(&index);
        }
        drop(runs);

        Ok(rows)
    }

    /// Promote staged partitions `0..count` to the committed cache.
    ///
    /// Fails, committing nothing, if the cache was evicted since
    /// `generation` or a partition is missing. Succeeds without touching
    /// staging if an overlapping run of the same generation committed first.
    pub fn commit(&self, generation: u64, count: usize) -> Result<()> {
        if self.generation() != generation {
            return Err(PllError::Cancelled);
        }
        if self.is_complete() {
            trace!(generation, "cache already committed by an overlapping run");
            return Ok(());
        }

        let mut parts = Vec::with_capacity(count);
        for index in 0..count {
            let rows = self
                .staging
                .get(&index)
                .and_then(|slot| slot.lock().clone());
            match rows {
                Some(rows) => parts.push(rows),
                // Staging is cleared by a competing commit
                None if self.is_complete() && self.generation() == generation => {
                    return Ok(())
                }
                None => return Err(PllError::IncompleteCache { index }),
            }
        }

        // Re-check under the write lock: evict() bumps the generation while
        // holding it, so the two cannot interleave.
        let mut committed = self.committed.write();
        if self.generation() != generation {
            return Err(PllError::Cancelled);
        }
        if committed.is_some() {
            return Ok(());
        }
        *committed = Some(parts.into());
        drop(committed);

        self.staging.clear();
        Ok(())
    }

    /// Close a cache run opened with [`begin_run`](Self::begin_run).
    ///
    /// Staged slots of an unsuccessful run are dropped once no other run
    /// is left to use them.
    pub fn end_run(&self, committed: bool) {
        let mut runs = self.runs.lock();
        *runs = runs.saturating_sub(1);
        if !committed && *runs == 0 {
            self.staging.clear();
        }
    }

    /// Discard materialized content.
    ///
    /// Returns true if a complete cache was dropped.
    pub fn evict(&self) -> bool {
        let dropped = {
            let mut committed = self.committed.write();
            self.generation.fetch_add(1, Ordering::AcqRel);
            committed.take().is_some()
        };
        self.staging.clear();
        if dropped {
            self.metrics.lock().evictions += 1;
        }
        dropped
    }

    fn committed_slot(&self, index: usize) -> Option<Arc<[T]>> {
        self.committed
            .read()
            .as_ref()
            .and_then(|parts| parts.get(index).cloned())
    }
}

impl<T> std::fmt::Debug for PartitionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionCache")
            .field("complete", &self.is_complete())
            .field("staged", &self.staging.len())
            .field("generation", &self.generation())
            .finish()
    }
}
