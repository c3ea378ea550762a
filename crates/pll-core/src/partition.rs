//! Partitions
//!
//! A partition is an addressable, ordered slice of a PLL's logical domain,
//! identified by its zero-based index. Partitions are immutable once created.

use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// An addressable slice of a PLL.
pub trait Partition: Debug + Send + Sync {
    /// Zero-based index, unique and contiguous within the owning PLL
    fn index(&self) -> usize;

    /// The partition of the parent PLL this one is computed from, if any
    fn parent(&self) -> Option<&Arc<dyn Partition>> {
        None
    }
}

/// A contiguous range of a resident sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InMemoryPartition {
    index: usize,
    offset: usize,
    length: usize,
}

impl InMemoryPartition {
    pub(crate) fn new(index: usize, offset: usize, length: usize) -> Self {
        Self {
            index,
            offset,
            length,
        }
    }

    /// Position of the first element in the backing sequence
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements in this partition
    pub fn length(&self) -> usize {
        self.length
    }

    /// Exclusive end position in the backing sequence
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

impl Partition for InMemoryPartition {
    fn index(&self) -> usize {
        self.index
    }
}

/// A partition of a derived PLL, linked to the parent partition it maps.
#[derive(Debug, Clone)]
pub struct DerivedPartition {
    index: usize,
    parent: Arc<dyn Partition>,
}

impl DerivedPartition {
    /// Derive a partition with the same index as its parent.
    pub fn from_parent(parent: Arc<dyn Partition>) -> Self {
        Self {
            index: parent.index(),
            parent,
        }
    }
}

impl Partition for DerivedPartition {
    fn index(&self) -> usize {
        self.index
    }

    fn parent(&self) -> Option<&Arc<dyn Partition>> {
        Some(&self.parent)
    }
}
