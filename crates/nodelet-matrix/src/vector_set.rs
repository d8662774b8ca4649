//! A set of growable scalar vectors, striped like matrix rows.

use std::fmt;
use std::sync::Arc;

use nodelet_arena::Machine;
use nodelet_core::{Location, NodeletError, PartitionId, Resident, Scalar};
use nodelet_sched::TaskContext;

use crate::config::MatrixConfig;
use crate::header::RowsHeader;
use crate::rows::PartitionedRows;

/// `len` vectors of scalars; vector `i` lives on partition `i mod P`.
#[derive(Clone)]
pub struct DistributedVectorSet {
    vectors: PartitionedRows<Scalar>,
}

impl DistributedVectorSet {
    /// Create `len` empty vectors.
    pub fn create(ctx: &mut TaskContext, len: usize) -> Result<Self, NodeletError> {
        Self::create_with(ctx, len, &MatrixConfig::default())
    }

    /// Create `len` empty vectors with per-vector reservations from
    /// `config`.
    pub fn create_with(
        ctx: &mut TaskContext,
        len: usize,
        config: &MatrixConfig,
    ) -> Result<Self, NodeletError> {
        PartitionedRows::create(ctx, len, config).map(|vectors| Self { vectors })
    }

    /// Partition owning vector `i`.
    pub fn owning_partition(&self, i: usize) -> Result<PartitionId, NodeletError> {
        self.vectors.owning_partition(i)
    }

    /// Where vector `i` lives, for hinting.
    pub fn address(&self, i: usize) -> Result<Location, NodeletError> {
        self.vectors.row_address(i)
    }

    /// Append `v` to vector `i`.
    pub fn push<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        i: usize,
        v: Scalar,
    ) -> Result<(), NodeletError> {
        self.vectors.append(ctx, i, v)
    }

    /// Append `values` to vector `i` in order.
    pub fn extend<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        i: usize,
        values: &[Scalar],
    ) -> Result<(), NodeletError> {
        self.vectors.extend(ctx, i, values)
    }

    /// Hint toward vector `i` and spawn a task appending `values` to it.
    pub fn spawn_extend(
        &self,
        ctx: &mut TaskContext,
        i: usize,
        values: Vec<Scalar>,
    ) -> Result<(), NodeletError> {
        self.vectors
            .spawn_on_row(ctx, i, move |task, vectors| vectors.extend(task, i, &values))
    }

    /// A copy of vector `i`.
    pub fn get<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        i: usize,
    ) -> Result<Vec<Scalar>, NodeletError> {
        self.vectors.read(ctx, i)
    }

    /// Length of vector `i`.
    pub fn len_of<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        i: usize,
    ) -> Result<usize, NodeletError> {
        self.vectors.len_of(ctx, i)
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    /// Always false: construction rejects an empty set.
    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    /// Vector slots on each partition.
    pub fn per_partition(&self) -> usize {
        self.vectors.rows_per_partition()
    }

    /// The header copy local to `ctx`.
    pub fn header<R: Resident + ?Sized>(&self, ctx: &R) -> Result<&RowsHeader, NodeletError> {
        self.vectors.header(ctx)
    }

    /// Whether all header copies are identical.
    pub fn is_header_coherent(&self) -> bool {
        self.vectors.is_header_coherent()
    }

    /// Constructed slots on `partition`.
    pub fn slots_on(&self, partition: PartitionId) -> usize {
        self.vectors.slots_on(partition)
    }

    /// Partition whose heap holds vector `i`.
    pub fn storage_partition(&self, i: usize) -> Result<PartitionId, NodeletError> {
        self.vectors.storage_partition(i)
    }

    /// The machine the set lives on.
    pub fn machine(&self) -> &Arc<Machine> {
        self.vectors.machine()
    }
}

impl fmt::Debug for DistributedVectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedVectorSet")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
