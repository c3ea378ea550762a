//! Derived PLLs
//!
//! A derived PLL is computed from a parent by transforming each parent
//! partition's lazy stream. It keeps the parent's partitioning: partition `i`
//! is computed from parent partition `i`.
//!
//! Until cached, every `compute` walks the lineage and applies the
//! transformation on the fly. `cache_async` materializes every partition on
//! the context's workers and commits them together; `uncache` drops them and
//! falls back to lineage.

use crate::cache::{CacheMetrics, PartitionCache};
use crate::context::PllContext;
use crate::error::Result;
use crate::in_memory::InMemoryPll;
use crate::partition::{DerivedPartition, Partition};
use crate::pll::{
    check_partition, Element, ElementStream, Pll, PllId, PllNode, PllRef, SharedSliceIter,
};
use crate::progress::{FutureStatus, ProgressingFuture};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Transformation applied to one partition: receives the partition index and
/// the parent's stream for that partition.
pub type TransformFn<T, U> =
    Arc<dyn Fn(usize, ElementStream<T>) -> Result<ElementStream<U>> + Send + Sync>;

/// PLL obtained by transforming each partition of a parent PLL.
pub struct MapPartitionsPll<T, U> {
    id: PllId,
    label: String,
    context: Arc<PllContext>,
    parent: PllRef<T>,
    partitions: Vec<Arc<dyn Partition>>,
    transform: TransformFn<T, U>,
    cache: PartitionCache<U>,
    /// Partition sizes, once enumerated
    sizes: OnceCell<Vec<u64>>,
}

impl<T: Element, U: Element> MapPartitionsPll<T, U> {
    /// Derive a PLL from `parent`. The parent is fixed for the PLL's lifetime.
    pub fn new(
        parent: PllRef<T>,
        label: impl Into<String>,
        transform: TransformFn<T, U>,
    ) -> Arc<Self> {
        let context = parent.context().clone();
        let partitions = parent
            .partitions()
            .iter()
            .map(|p| Arc::new(DerivedPartition::from_parent(p.clone())) as Arc<dyn Partition>)
            .collect();

        let id = context.next_id();
        let label = label.into();
        debug!(pll = %id, parent = %parent.id(), label = %label, "created derived PLL");

        Arc::new(Self {
            id,
            label,
            context,
            parent,
            partitions,
            transform,
            cache: PartitionCache::new(),
            sizes: OnceCell::new(),
        })
    }

    /// The PLL this one is computed from
    pub fn parent(&self) -> &PllRef<T> {
        &self.parent
    }

    /// Get a snapshot of cache metrics
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    /// Recompute a partition through lineage, ignoring the cache
    fn compute_from_parent(&self, index: usize) -> Result<ElementStream<U>> {
        let parent_partition = &self.parent.partitions()[index];
        let upstream = self.parent.compute(parent_partition.as_ref())?;
        (self.transform)(index, upstream)
    }

    fn materialize_index(&self, index: usize) -> Result<Arc<[U]>> {
        self.cache
            .materialize(index, || self.compute_from_parent(index))
    }
}

impl<T: Element, U: Element> PllNode for MapPartitionsPll<T, U> {
    fn id(&self) -> PllId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn context(&self) -> &Arc<PllContext> {
        &self.context
    }

    fn partitions(&self) -> &[Arc<dyn Partition>] {
        &self.partitions
    }

    fn has_cached_partition_sizes(&self) -> bool {
        self.cache.is_complete() || self.sizes.get().is_some()
    }

    fn cache_async(self: Arc<Self>) -> ProgressingFuture<()> {
        if self.cache.is_complete() {
            return ProgressingFuture::immediate(());
        }

        let generation = self.cache.begin_run();
        let count = self.num_partitions();
        debug!(pll = %self.id, partitions = count, "caching");

        let worker = self.clone();
        let committer = self.clone();
        let future = self.context.submit_partition_work(
            &self.label,
            count,
            move |index| worker.materialize_index(index).map(|_| ()),
            move |_: Vec<()>| {
                committer.cache.commit(generation, count)?;
                info!(pll = %committer.id, label = %committer.label, "cached");
                Ok(())
            },
        );

        let run = self.clone();
        future.on_complete(move |status| {
            run.cache.end_run(status == FutureStatus::Succeeded);
        });
        future
    }

    fn is_cached(&self) -> bool {
        self.cache.is_complete()
    }

    fn uncache(&self) {
        if self.cache.evict() {
            info!(pll = %self.id, label = %self.label, "evicted cache");
        }
    }

    fn parents(&self) -> Vec<Arc<dyn PllNode>> {
        vec![self.parent.clone().into_node()]
    }
}

impl<T: Element, U: Element> Pll<U> for MapPartitionsPll<T, U> {
    fn compute(&self, partition: &dyn Partition) -> Result<ElementStream<U>> {
        let index = check_partition(self, partition)?.index();
        match self.cache.get(index) {
            Some(rows) => Ok(Box::new(SharedSliceIter::full(rows))),
            None => self.compute_from_parent(index),
        }
    }

    fn compute_partition_sizes(&self) -> Result<Vec<u64>> {
        if let Some(sizes) = self.cache.sizes() {
            return Ok(sizes);
        }
        let count = self.num_partitions();
        self.sizes
            .get_or_try_init(|| {
                self.context.install(|| {
                    (0..count)
                        .into_par_iter()
                        .map(|index| -> Result<u64> {
                            Ok(self.compute_from_parent(index)?.count() as u64)
                        })
                        .collect::<Result<Vec<u64>>>()
                })
            })
            .cloned()
    }

    fn into_node(self: Arc<Self>) -> Arc<dyn PllNode> {
        self
    }

    fn materialize(&self, partition: &dyn Partition) -> Result<Arc<[U]>> {
        let index = check_partition(self, partition)?.index();
        self.materialize_index(index)
    }
}

impl<T: Element, U: Element> fmt::Debug for MapPartitionsPll<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapPartitionsPll")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("parent", &self.parent.id())
            .field("partitions", &self.partitions.len())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Derivation helpers available on PLL handles.
pub trait PllExt<T: Element> {
    /// This PLL as a type-erased handle
    fn as_pll_ref(&self) -> PllRef<T>;

    /// Transform each partition's stream.
    fn map_partitions<U, F>(&self, label: impl Into<String>, f: F) -> Arc<MapPartitionsPll<T, U>>
    where
        U: Element,
        F: Fn(usize, ElementStream<T>) -> Result<ElementStream<U>> + Send + Sync + 'static,
    {
        MapPartitionsPll::new(self.as_pll_ref(), label, Arc::new(f))
    }

    /// Apply `f` to every element.
    fn map<U, F>(&self, f: F) -> Arc<MapPartitionsPll<T, U>>
    where
        U: Element,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.map_partitions("Map elements", move |_, stream| {
            let f = f.clone();
            Ok(Box::new(stream.map(move |x| f(x))) as ElementStream<U>)
        })
    }

    /// Keep the elements matching `predicate`.
    fn filter<F>(&self, predicate: F) -> Arc<MapPartitionsPll<T, T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.map_partitions("Filter elements", move |_, stream| {
            let predicate = predicate.clone();
            Ok(Box::new(stream.filter(move |x| predicate(x))) as ElementStream<T>)
        })
    }

    /// Replace every element with the elements `f` produces for it.
    fn flat_map<U, I, F>(&self, f: F) -> Arc<MapPartitionsPll<T, U>>
    where
        U: Element,
        I: IntoIterator<Item = U> + 'static,
        I::IntoIter: Send + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.map_partitions("Flat map elements", move |_, stream| {
            let f = f.clone();
            Ok(Box::new(stream.flat_map(move |x| f(x))) as ElementStream<U>)
        })
    }
}

impl<T: Element> PllExt<T> for PllRef<T> {
    fn as_pll_ref(&self) -> PllRef<T> {
        self.clone()
    }
}

impl<T: Element> PllExt<T> for Arc<InMemoryPll<T>> {
    fn as_pll_ref(&self) -> PllRef<T> {
        self.clone()
    }
}

impl<S: Element, T: Element> PllExt<T> for Arc<MapPartitionsPll<S, T>> {
    fn as_pll_ref(&self) -> PllRef<T> {
        self.clone()
    }
}
