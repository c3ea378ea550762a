//! The PLL contract
//!
//! A PLL (partitioned lazy list) is an immutable, partitioned collection whose
//! content is computed on demand. Backends differ only in how they produce a
//! partition's elements: a leaf reads resident memory, a derived PLL walks its
//! lineage and transforms its parents' output on the fly.
//!
//! Two traits split the contract:
//! - [`PllNode`] is the type-erased view used for lineage (parents of a PLL
//!   may hold a different element type) and for the cache lifecycle.
//! - [`Pll<T>`] adds element access.

use crate::context::PllContext;
use crate::error::{PllError, Result};
use crate::partition::Partition;
use crate::progress::ProgressingFuture;
use std::fmt;
use std::sync::Arc;

/// Bound shared by every PLL element type.
pub trait Element: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Element for T {}

/// Lazy, single-pass, non-restartable sequence of a partition's elements.
pub type ElementStream<T> = Box<dyn Iterator<Item = T> + Send>;

/// Shared handle on a PLL of `T`.
pub type PllRef<T> = Arc<dyn Pll<T>>;

/// Identifier of a PLL, unique within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PllId(u64);

impl PllId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PllId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pll-{}", self.0)
    }
}

/// Lineage and cache lifecycle of a PLL, independent of its element type.
pub trait PllNode: fmt::Debug + Send + Sync {
    /// Identifier allocated by the owning context
    fn id(&self) -> PllId;

    /// Human-readable label, for diagnostics and progress display
    fn label(&self) -> &str;

    /// The execution context owning this PLL
    fn context(&self) -> &Arc<PllContext>;

    /// Stable, ordered partitions of this PLL
    fn partitions(&self) -> &[Arc<dyn Partition>];

    /// Number of partitions
    fn num_partitions(&self) -> usize {
        self.partitions().len()
    }

    /// Whether partition sizes are known without enumerating content
    fn has_cached_partition_sizes(&self) -> bool;

    /// Start materializing every partition.
    ///
    /// Returns an already-completed handle when the PLL is cached.
    fn cache_async(self: Arc<Self>) -> ProgressingFuture<()>;

    /// Whether the content is currently materialized
    fn is_cached(&self) -> bool;

    /// Discard materialized content. Lineage is kept, so the content can
    /// still be recomputed. Idempotent.
    fn uncache(&self);

    /// PLLs this one is computed from, in order. Empty for leaves.
    fn parents(&self) -> Vec<Arc<dyn PllNode>>;
}

/// A partitioned lazy list of `T`.
pub trait Pll<T: Element>: PllNode {
    /// Lazily enumerate the elements of a partition.
    ///
    /// Deterministic for a given parent content and free of side effects on
    /// shared state, so distinct partitions may be computed concurrently.
    fn compute(&self, partition: &dyn Partition) -> Result<ElementStream<T>>;

    /// Number of elements in each partition, in partition order
    fn compute_partition_sizes(&self) -> Result<Vec<u64>>;

    /// Upcast to the type-erased lineage view
    fn into_node(self: Arc<Self>) -> Arc<dyn PllNode>;

    /// Fully compute a partition into memory.
    fn materialize(&self, partition: &dyn Partition) -> Result<Arc<[T]>> {
        Ok(self.compute(partition)?.collect())
    }

    /// All elements, partitions concatenated in index order
    fn iterate(&self) -> Result<ElementStream<T>> {
        let streams = self
            .partitions()
            .iter()
            .map(|partition| self.compute(partition.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(streams.into_iter().flatten()))
    }

    /// Collect every element into a vector
    fn collect(&self) -> Result<Vec<T>> {
        Ok(self.iterate()?.collect())
    }

    /// Total number of elements
    fn count(&self) -> Result<u64> {
        Ok(self.compute_partition_sizes()?.iter().sum())
    }

    /// The first `limit` elements
    fn take(&self, limit: usize) -> Result<Vec<T>> {
        Ok(self.iterate()?.take(limit).collect())
    }
}

/// Look up a partition by index, validating the range.
pub(crate) fn check_partition<'a>(
    node: &'a dyn PllNode,
    partition: &dyn Partition,
) -> Result<&'a Arc<dyn Partition>> {
    let index = partition.index();
    node.partitions()
        .get(index)
        .ok_or_else(|| PllError::out_of_range(node.label(), index, node.num_partitions()))
}

/// Zero-copy iterator over a range of a shared slice.
///
/// Elements are cloned as they are yielded; the backing slice is never copied.
#[derive(Debug, Clone)]
pub struct SharedSliceIter<T> {
    rows: Arc<[T]>,
    position: usize,
    end: usize,
}

impl<T> SharedSliceIter<T> {
    /// Iterate over `rows[start..end]`
    pub fn new(rows: Arc<[T]>, start: usize, end: usize) -> Self {
        let end = end.min(rows.len());
        Self {
            rows,
            position: start.min(end),
            end,
        }
    }

    /// Iterate over the whole slice
    pub fn full(rows: Arc<[T]>) -> Self {
        let end = rows.len();
        Self::new(rows, 0, end)
    }
}

impl<T: Clone> Iterator for SharedSliceIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.position >= self.end {
            return None;
        }
        let item = self.rows[self.position].clone();
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.position;
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for SharedSliceIter<T> {}
