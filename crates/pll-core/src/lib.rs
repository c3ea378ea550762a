//! PLL Core - Partitioned lazy lists
//!
//! This crate provides the computational core of the transformation engine:
//! - The PLL contract: lazy, partitioned collections with lineage
//! - A leaf backend loading resident data into balanced in-memory partitions
//! - A derived backend applying a transformation to each parent partition
//! - An all-or-nothing partition cache with per-partition deduplication
//! - The execution context (worker pool) and progress-reporting handles
//!
//! # Architecture
//!
//! ```text
//! PllContext (rayon pool, id allocation)
//! ├── InMemoryPll<T>            leaf, always cached, no parents
//! └── MapPartitionsPll<T, U>    derived, lazy until cached
//!     ├── parent: PllRef<T>     lineage edge (shared ownership)
//!     └── PartitionCache<U>     committed slices + staging slots
//! ```

pub mod cache;
pub mod context;
pub mod derived;
pub mod error;
pub mod in_memory;
pub mod lineage;
pub mod partition;
pub mod pll;
pub mod progress;

// Re-exports for convenience
pub use cache::{CacheMetrics, PartitionCache};
pub use context::{ContextConfig, PllContext};
pub use derived::{MapPartitionsPll, PllExt, TransformFn};
pub use error::{PllError, Result};
pub use in_memory::{create_partitions, InMemoryPll};
pub use lineage::{ancestors, cache_all, cache_plan, lineage_depth};
pub use partition::{DerivedPartition, InMemoryPartition, Partition};
pub use pll::{Element, ElementStream, Pll, PllId, PllNode, PllRef, SharedSliceIter};
pub use progress::{Completer, FutureStatus, ProgressReporter, ProgressingFuture};
