//! In-memory leaf PLL
//!
//! A PLL built directly from resident data. The elements are split into
//! contiguous, balanced partitions which can be enumerated independently.
//! There is no cheaper source to fall back to, so the PLL always reports
//! itself as cached and `uncache` does nothing.

use crate::context::PllContext;
use crate::error::{PllError, Result};
use crate::partition::{InMemoryPartition, Partition};
use crate::pll::{check_partition, Element, ElementStream, Pll, PllId, PllNode, SharedSliceIter};
use crate::progress::ProgressingFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Split `size` elements into `nb_partitions` contiguous partitions.
///
/// Partition lengths differ by at most one, larger partitions first.
/// Zero partitions are only accepted for an empty collection.
pub fn create_partitions(size: usize, nb_partitions: i64) -> Result<Vec<InMemoryPartition>> {
    if nb_partitions < 0 {
        return Err(PllError::invalid_argument(
            "The number of partitions cannot be negative",
        ));
    }
    if nb_partitions == 0 {
        if size == 0 {
            return Ok(Vec::new());
        }
        return Err(PllError::invalid_argument(
            "At least one partition is required to represent a non-empty list",
        ));
    }

    let nb_partitions = usize::try_from(nb_partitions)
        .map_err(|_| PllError::invalid_argument("The number of partitions is too large"))?;
    let partition_size = size / nb_partitions;
    let mut extra_elements = size - nb_partitions * partition_size;
    let mut offset = 0;
    let mut partitions = Vec::with_capacity(nb_partitions);

    for index in 0..nb_partitions {
        let mut length = partition_size;
        if extra_elements > 0 {
            length += 1;
            extra_elements -= 1;
        }
        partitions.push(InMemoryPartition::new(index, offset, length));
        offset += length;
    }

    Ok(partitions)
}

/// Leaf PLL over a resident, ordered collection.
pub struct InMemoryPll<T> {
    id: PllId,
    label: String,
    context: Arc<PllContext>,
    elements: Arc<[T]>,
    layout: Vec<InMemoryPartition>,
    partitions: Vec<Arc<dyn Partition>>,
}

impl<T: Element> InMemoryPll<T> {
    /// Load `elements` into `nb_partitions` balanced partitions.
    ///
    /// Fails without building anything when the partition count is negative,
    /// or zero for a non-empty collection.
    pub fn new<I>(context: &Arc<PllContext>, elements: I, nb_partitions: i64) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = T>,
    {
        let elements: Arc<[T]> = elements.into_iter().collect();
        let layout = create_partitions(elements.len(), nb_partitions)?;
        let partitions = layout
            .iter()
            .map(|p| Arc::new(*p) as Arc<dyn Partition>)
            .collect();

        let id = context.next_id();
        let label = format!(
            "Load {} elements into {} partitions",
            elements.len(),
            nb_partitions
        );
        debug!(pll = %id, label = %label, "created in-memory PLL");

        Ok(Arc::new(Self {
            id,
            label,
            context: context.clone(),
            elements,
            layout,
            partitions,
        }))
    }

    /// The partition layout (offsets and lengths into the backing sequence)
    pub fn layout(&self) -> &[InMemoryPartition] {
        &self.layout
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn slot(&self, partition: &dyn Partition) -> Result<InMemoryPartition> {
        check_partition(self, partition)?;
        Ok(self.layout[partition.index()])
    }
}

impl<T: Element> PllNode for InMemoryPll<T> {
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
        true
    }

    fn cache_async(self: Arc<Self>) -> ProgressingFuture<()> {
        ProgressingFuture::immediate(())
    }

    fn is_cached(&self) -> bool {
        true
    }

    fn uncache(&self) {
        // resident data is the source itself
    }

    fn parents(&self) -> Vec<Arc<dyn PllNode>> {
        Vec::new()
    }
}

impl<T: Element> Pll<T> for InMemoryPll<T> {
    fn compute(&self, partition: &dyn Partition) -> Result<ElementStream<T>> {
        let slot = self.slot(partition)?;
        Ok(Box::new(SharedSliceIter::new(
            self.elements.clone(),
            slot.offset(),
            slot.end(),
        )))
    }

    fn compute_partition_sizes(&self) -> Result<Vec<u64>> {
        Ok(self.layout.iter().map(|p| p.length() as u64).collect())
    }

    fn into_node(self: Arc<Self>) -> Arc<dyn PllNode> {
        self
    }

    fn materialize(&self, partition: &dyn Partition) -> Result<Arc<[T]>> {
        let slot = self.slot(partition)?;
        Ok(Arc::from(&self.elements[slot.offset()..slot.end()]))
    }
}

impl<T> fmt::Debug for InMemoryPll<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryPll")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("elements", &self.elements.len())
            .field("partitions", &self.layout.len())
            .finish()
    }
}
