//! Sparse matrix with row-striped storage.

use std::fmt;
use std::sync::Arc;

use nodelet_arena::Machine;
use nodelet_core::{Index, Location, NodeletError, PartitionId, Resident, Scalar};
use nodelet_sched::TaskContext;

use crate::config::MatrixConfig;
use crate::header::RowsHeader;
use crate::rows::PartitionedRows;

/// One sparse entry: `(column, value)`.
pub type Entry = (Index, Scalar);

/// A matrix of `nrows` sparse rows, row `i` stored on partition `i mod P`.
///
/// Every partition holds a copy of the header, so any task can locate any
/// row without migrating. A row's entries live only on its owning
/// partition.
///
/// # Building rows
///
/// ```ignore
/// let a = DistributedMatrix::create(&mut ctx, 16)?;
/// a.spawn_build(&mut ctx, 2, EVEN_ROW.to_vec())?; // hint + spawn
/// ctx.join()?;
/// ```
#[derive(Clone)]
pub struct DistributedMatrix {
    rows: PartitionedRows<Entry>,
}

impl DistributedMatrix {
    /// Create an `nrows`-row matrix with empty rows.
    pub fn create(ctx: &mut TaskContext, nrows: usize) -> Result<Self, NodeletError> {
        Self::create_with(ctx, nrows, &MatrixConfig::default())
    }

    /// Create an `nrows`-row matrix, reserving per-row storage per `config`.
    pub fn create_with(
        ctx: &mut TaskContext,
        nrows: usize,
        config: &MatrixConfig,
    ) -> Result<Self, NodeletError> {
        PartitionedRows::create(ctx, nrows, config).map(|rows| Self { rows })
    }

    /// Partition owning `row`.
    pub fn owning_partition(&self, row: usize) -> Result<PartitionId, NodeletError> {
        self.rows.owning_partition(row)
    }

    /// Where `row` lives, for hinting.
    pub fn row_address(&self, row: usize) -> Result<Location, NodeletError> {
        self.rows.row_address(row)
    }

    /// Append `(col, val)` to `row`, on the row's partition.
    ///
    /// The caller must not append to the same row from two tasks at once;
    /// if it does, one of them gets `RowBusy`.
    pub fn append_entry<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
        col: Index,
        val: Scalar,
    ) -> Result<(), NodeletError> {
        self.rows.append(ctx, row, (col, val))
    }

    /// Append `entries` to `row` in order.
    pub fn append_entries<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
        entries: &[Entry],
    ) -> Result<(), NodeletError> {
        self.rows.extend(ctx, row, entries)
    }

    /// Hint toward `row` and spawn a task that appends `entries` to it.
    ///
    /// The builder starts on the row's partition, so every append is local.
    /// Its appends are wrapped in a [`BUILD_REGION`](crate::BUILD_REGION)
    /// measurement region. Collect its result with [`TaskContext::join`].
    pub fn spawn_build(
        &self,
        ctx: &mut TaskContext,
        row: usize,
        entries: Vec<Entry>,
    ) -> Result<(), NodeletError> {
        self.rows
            .spawn_on_row(ctx, row, move |task, rows| {
                for &entry in &entries {
                    rows.append(task, row, entry)?;
                }
                Ok(())
            })
    }

    /// `row`'s entries in insertion order.
    pub fn row<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
    ) -> Result<Vec<Entry>, NodeletError> {
        self.rows.read(ctx, row)
    }

    /// Number of entries in `row`.
    pub fn row_len<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
    ) -> Result<usize, NodeletError> {
        self.rows.len_of(ctx, row)
    }

    /// Logical row count.
    pub fn nrows(&self) -> usize {
        self.rows.nrows()
    }

    /// `ceil(nrows / P)`.
    pub fn rows_per_partition(&self) -> usize {
        self.rows.rows_per_partition()
    }

    /// The header copy local to `ctx`.
    pub fn header<R: Resident + ?Sized>(&self, ctx: &R) -> Result<&RowsHeader, NodeletError> {
        self.rows.header(ctx)
    }

    /// The header copy on `partition`.
    pub fn header_replica(&self, partition: PartitionId) -> Option<&RowsHeader> {
        self.rows.header_replica(partition)
    }

    /// Whether all header copies are identical.
    pub fn is_header_coherent(&self) -> bool {
        self.rows.is_header_coherent()
    }

    /// Constructed row slots on `partition`, padding included.
    pub fn slots_on(&self, partition: PartitionId) -> usize {
        self.rows.slots_on(partition)
    }

    /// Row slots on `partition` that a valid row index reaches.
    pub fn rows_on(&self, partition: PartitionId) -> usize {
        self.rows.rows_on(partition)
    }

    /// Partition whose heap holds `row`'s entries.
    pub fn storage_partition(&self, row: usize) -> Result<PartitionId, NodeletError> {
        self.rows.storage_partition(row)
    }

    /// The machine the matrix lives on.
    pub fn machine(&self) -> &Arc<Machine> {
        self.rows.machine()
    }
}

impl fmt::Debug for DistributedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedMatrix")
            .field("nrows", &self.nrows())
            .field("rows_per_partition", &self.rows_per_partition())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodelet_arena::MachineConfig;
    use nodelet_sched::{SchedConfig, Scheduler};
    use nodelet_test_utils::EVEN_ROW;

    fn scheduler(partitions: usize) -> Scheduler {
        let machine = Machine::new(MachineConfig::new(partitions).with_capacity(1 << 16)).unwrap();
        Scheduler::new(&machine, SchedConfig::default()).unwrap()
    }

    #[test]
    fn append_entry_preserves_order() {
        let s = scheduler(4);
        let mut ctx = s.root();
        let m = DistributedMatrix::create(&mut ctx, 8).unwrap();
        m.append_entry(&mut ctx, 5, 9, 1).unwrap();
        m.append_entry(&mut ctx, 5, 2, 7).unwrap();
        m.append_entries(&mut ctx, 5, &[(4, 4), (0, 0)]).unwrap();
        assert_eq!(m.row(&mut ctx, 5).unwrap(), vec![(9, 1), (2, 7), (4, 4), (0, 0)]);
        assert_eq!(m.row_len(&mut ctx, 5).unwrap(), 4);
    }

    #[test]
    fn spawn_build_places_builder_on_row_partition() {
        let s = scheduler(8);
        let mut ctx = s.root();
        let m = DistributedMatrix::create(&mut ctx, 16).unwrap();
        let before = s.migration_log().snapshot();
        m.spawn_build(&mut ctx, 2, EVEN_ROW.to_vec()).unwrap();
        ctx.join().unwrap();
        let delta = s.migration_log().snapshot().since(&before);
        assert_eq!(delta.spawns(PartitionId(0), PartitionId(2)), 1);
        // No outbound migration: only the builder's return home.
        assert_eq!(delta.migrations(PartitionId(0), PartitionId(2)), 0);
        assert_eq!(delta.total_migrations(), 1);
        assert_eq!(m.row(&mut ctx, 2).unwrap(), EVEN_ROW.to_vec());
    }

    #[test]
    fn debug_shows_shape() {
        let s = scheduler(2);
        let mut ctx = s.root();
        let m = DistributedMatrix::create(&mut ctx, 5).unwrap();
        let text = format!("{m:?}");
        assert!(text.contains("nrows: 5"));
        assert!(text.contains("rows_per_partition: 3"));
    }
}
