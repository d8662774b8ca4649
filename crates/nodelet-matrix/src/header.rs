//! The replicated header of a row structure.

use nodelet_core::BlockId;

/// Metadata every partition holds a copy of.
///
/// Written once at construction and never mutated, so reading it from any
/// partition needs neither a migration nor synchronisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowsHeader {
    /// Logical row count.
    pub nrows: usize,
    /// Row slots on each partition: `ceil(nrows / P)`.
    pub rows_per_partition: usize,
    /// Partition count `P` the structure was striped over.
    pub partitions: usize,
    /// The partitioned block holding every partition's row slots.
    pub body: BlockId,
}

impl RowsHeader {
    /// Total slots across all partitions, padding included.
    pub fn total_slots(&self) -> usize {
        self.rows_per_partition * self.partitions
    }

    /// Slots that correspond to no logical row.
    pub fn padding_slots(&self) -> usize {
        self.total_slots() - self.nrows
    }
}
