//! Row-striped storage shared by [`DistributedMatrix`] and
//! [`DistributedVectorSet`].
//!
//! Row `i` lives on partition `i mod P` in slot `i div P`. The header is
//! replicated on every partition; each row's entries are held in a
//! [`LocalVec`] charged to the owning partition's heap only.
//!
//! [`DistributedMatrix`]: crate::DistributedMatrix
//! [`DistributedVectorSet`]: crate::DistributedVectorSet

use std::fmt;
use std::sync::Arc;

use nodelet_arena::{ExclusiveCell, LocalVec, Machine, PartitionedBlock, Replicated};
use nodelet_core::{Location, NodeletError, PartitionId, Region, Resident, Striping};
use nodelet_sched::TaskContext;

use crate::config::MatrixConfig;
use crate::header::RowsHeader;

/// One row slot: the row's local storage behind a claim-or-fail cell.
pub(crate) type RowSlot<E> = ExclusiveCell<LocalVec<E>>;

/// Measurement region wrapping the construction fan-out.
pub const CREATE_REGION: &str = "matrix_create";

/// Measurement region wrapping each batch of appends run by
/// [`PartitionedRows::spawn_on_row`].
pub const BUILD_REGION: &str = "matrix_build";

struct Inner<E> {
    // Field order is drop order: rows and body block, then the header.
    body: Arc<PartitionedBlock<RowSlot<E>>>,
    header: Replicated<RowsHeader>,
    striping: Striping,
    nrows: usize,
}

/// `nrows` growable rows striped across the partitions of a machine.
///
/// Handles are cheap to clone and share one structure. The structure is
/// torn down, releasing every row, the body block, and the header replicas,
/// when the last handle drops.
pub struct PartitionedRows<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for PartitionedRows<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Send + 'static> PartitionedRows<E> {
    /// Build the structure with one construction task per partition.
    ///
    /// The body block and replicated header are allocated first. Then every
    /// partition's row slots are constructed by a task spawned directly on
    /// that partition, and all of them are joined before returning. On any
    /// failure nothing escapes: whatever was allocated is released before
    /// the error is returned.
    pub fn create(
        ctx: &mut TaskContext,
        nrows: usize,
        config: &MatrixConfig,
    ) -> Result<Self, NodeletError> {
        config.validate()?;
        if nrows == 0 {
            return Err(NodeletError::InvalidArgument {
                reason: "nrows must be positive".into(),
            });
        }
        let machine = Arc::clone(ctx.machine());
        let striping = machine.striping();
        let rows_per_partition = striping.slots_per_partition(nrows);

        let body = Arc::new(PartitionedBlock::<RowSlot<E>>::allocate(
            &machine,
            rows_per_partition,
        )?);
        let block = body.block().ok_or_else(|| NodeletError::InvalidArgument {
            reason: "body block was released during construction".into(),
        })?;
        let header = Replicated::new(
            &machine,
            RowsHeader {
                nrows,
                rows_per_partition,
                partitions: striping.partitions(),
                body: block,
            },
        )?;

        {
            let hooks = ctx.hooks();
            let _region = Region::enter(&*hooks, CREATE_REGION);
            fan_out(ctx, &machine, &body, config.row_reserve)?;
        }
        debug_assert!(body.is_complete());

        tracing::debug!(
            nrows,
            rows_per_partition,
            partitions = striping.partitions(),
            body = %block,
            "row structure created"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                body,
                header,
                striping,
                nrows,
            }),
        })
    }

    /// Hint toward `row`'s partition and spawn `task` there with a handle
    /// to this structure.
    ///
    /// The spawned task starts resident on the row's partition, so the work
    /// it does on that row is local from its first access. Its body runs
    /// inside a [`BUILD_REGION`] measurement region.
    ///
    /// Fails with `ForeignContext` if `ctx` runs on another machine.
    pub fn spawn_on_row<F>(
        &self,
        ctx: &mut TaskContext,
        row: usize,
        task: F,
    ) -> Result<(), NodeletError>
    where
        F: FnOnce(&mut TaskContext, &PartitionedRows<E>) -> Result<(), NodeletError>
            + Send
            + 'static,
    {
        self.machine().check_resident(&*ctx)?;
        let location = self.row_address(row)?;
        ctx.hint(location);
        let rows = self.clone();
        ctx.spawn(move |task_ctx| {
            let hooks = task_ctx.hooks();
            let _region = Region::enter(&*hooks, BUILD_REGION);
            task(task_ctx, &rows)
        })
    }
}

/// Spawn one slot-construction task per partition and join them.
fn fan_out<E: Send + 'static>(
    ctx: &mut TaskContext,
    machine: &Arc<Machine>,
    body: &Arc<PartitionedBlock<RowSlot<E>>>,
    row_reserve: usize,
) -> Result<(), NodeletError> {
    let mut spawned = Ok(());
    for partition in machine.partition_ids() {
        ctx.hint(Location::base_of(partition));
        let body = Arc::clone(body);
        let machine = Arc::clone(machine);
        let result = ctx.spawn(move |task| {
            body.init_local(task, partition, |_| {
                LocalVec::with_capacity(Arc::clone(&machine), partition, row_reserve)
                    .map(ExclusiveCell::new)
            })
        });
        if let Err(e) = result {
            spawned = Err(e);
            break;
        }
    }
    // Join even after a failed spawn so no construction task outlives us.
    let joined = ctx.join();
    spawned.and(joined).inspect_err(|e| {
        tracing::warn!(error = %e, "row construction failed");
    })
}

impl<E> PartitionedRows<E> {
    /// Partition that owns `row`: `row mod P`.
    pub fn owning_partition(&self, row: usize) -> Result<PartitionId, NodeletError> {
        self.row_address(row).map(|l| l.partition)
    }

    /// Partition and in-partition slot of `row`.
    ///
    /// Pass the result to [`TaskContext::hint`] before spawning work on the
    /// row. Touching it migrates the caller to the row's partition.
    pub fn row_address(&self, row: usize) -> Result<Location, NodeletError> {
        self.inner.striping.checked_location(row, self.inner.nrows)
    }

    /// Migrate to `row`'s partition and return its slot.
    ///
    /// A context from another machine is rejected before it moves.
    fn slot<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
    ) -> Result<&RowSlot<E>, NodeletError> {
        // Addressing reads the local header replica; no migration yet.
        let header = self.inner.header.get(&*ctx)?;
        let location = self.inner.striping.checked_location(row, header.nrows)?;
        ctx.touch(location);
        self.inner
            .body
            .get(location)
            .ok_or(NodeletError::IndexOutOfRange {
                index: row,
                len: header.nrows,
            })
    }

    /// Append `item` to the end of `row`.
    ///
    /// Runs on the row's owning partition (migrating there if needed), so
    /// any growth is charged to that partition. Fails with `RowBusy` if
    /// another task is appending to the same row.
    pub fn append<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
        item: E,
    ) -> Result<(), NodeletError> {
        let slot = self.slot(ctx, row)?;
        let mut entries = slot.try_claim().ok_or(NodeletError::RowBusy { row })?;
        entries.push(item)
    }

    /// Append `items` to `row` in order, all or nothing.
    pub fn extend<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
        items: &[E],
    ) -> Result<(), NodeletError>
    where
        E: Clone,
    {
        let slot = self.slot(ctx, row)?;
        let mut entries = slot.try_claim().ok_or(NodeletError::RowBusy { row })?;
        entries.extend_from_slice(items)
    }

    /// A copy of `row`'s entries in insertion order.
    pub fn read<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
    ) -> Result<Vec<E>, NodeletError>
    where
        E: Clone,
    {
        let slot = self.slot(ctx, row)?;
        let entries = slot.try_claim().ok_or(NodeletError::RowBusy { row })?;
        Ok(entries.as_slice().to_vec())
    }

    /// Number of entries in `row`.
    pub fn len_of<R: Resident + ?Sized>(
        &self,
        ctx: &mut R,
        row: usize,
    ) -> Result<usize, NodeletError> {
        let slot = self.slot(ctx, row)?;
        let entries = slot.try_claim().ok_or(NodeletError::RowBusy { row })?;
        Ok(entries.len())
    }

    /// The partition whose heap backs `row`'s storage.
    ///
    /// An observer query: it does not migrate.
    pub fn storage_partition(&self, row: usize) -> Result<PartitionId, NodeletError> {
        let location = self.row_address(row)?;
        let slot = self
            .inner
            .body
            .get(location)
            .ok_or(NodeletError::IndexOutOfRange {
                index: row,
                len: self.inner.nrows,
            })?;
        let entries = slot.try_claim().ok_or(NodeletError::RowBusy { row })?;
        Ok(entries.partition())
    }

    /// The header copy on the caller's current partition. Never migrates.
    pub fn header<R: Resident + ?Sized>(&self, ctx: &R) -> Result<&RowsHeader, NodeletError> {
        self.inner.header.get(ctx)
    }

    /// The header copy resident on `partition`.
    pub fn header_replica(&self, partition: PartitionId) -> Option<&RowsHeader> {
        self.inner.header.replica(partition)
    }

    /// Whether every header replica equals the home copy.
    pub fn is_header_coherent(&self) -> bool {
        self.inner.header.is_coherent()
    }

    /// Logical row count.
    pub fn nrows(&self) -> usize {
        self.inner.nrows
    }

    /// Row slots on each partition, padding included.
    pub fn rows_per_partition(&self) -> usize {
        self.inner.body.slots_per_partition()
    }

    /// Constructed slots on `partition`.
    pub fn slots_on(&self, partition: PartitionId) -> usize {
        self.inner.body.slab(partition).map_or(0, <[_]>::len)
    }

    /// Slots on `partition` reachable through a valid row index.
    pub fn rows_on(&self, partition: PartitionId) -> usize {
        self.inner.striping.valid_slots(partition, self.inner.nrows)
    }

    /// The machine the structure lives on.
    pub fn machine(&self) -> &Arc<Machine> {
        self.inner.body.machine()
    }
}

impl<E> fmt::Debug for PartitionedRows<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedRows")
            .field("header", self.inner.header.home())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodelet_arena::MachineConfig;
    use nodelet_sched::{SchedConfig, Scheduler};
    use nodelet_test_utils::{MockResident, RecordingHooks};

    fn scheduler(partitions: usize, capacity: usize) -> Scheduler {
        let machine = Machine::new(MachineConfig::new(partitions).with_capacity(capacity)).unwrap();
        Scheduler::new(&machine, SchedConfig::default()).unwrap()
    }

    #[test]
    fn zero_rows_rejected() {
        let s = scheduler(4, 4096);
        let mut ctx = s.root();
        let err =
            PartitionedRows::<u32>::create(&mut ctx, 0, &MatrixConfig::default()).unwrap_err();
        assert!(matches!(err, NodeletError::InvalidArgument { .. }));
        assert_eq!(s.machine().live_blocks(), 0);
    }

    #[test]
    fn fan_out_builds_every_partition_locally() {
        let s = scheduler(4, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 10, &MatrixConfig::default()).unwrap();
        assert_eq!(rows.rows_per_partition(), 3);
        for p in s.machine().partition_ids() {
            assert_eq!(rows.slots_on(p), 3);
            // One construction task spawned straight onto each partition.
            assert_eq!(s.migration_log().spawns(PartitionId::HOME, p), 1);
        }
        assert_eq!(rows.rows_on(PartitionId(1)), 3);
        assert_eq!(rows.rows_on(PartitionId(3)), 2);
    }

    #[test]
    fn append_migrates_once_then_stays_local() {
        let s = scheduler(4, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 8, &MatrixConfig::default()).unwrap();
        // A scheduler-free resident is enough to exercise placement.
        let mut mock = MockResident::home();
        for v in 0..5 {
            rows.append(&mut mock, 6, v).unwrap();
        }
        assert_eq!(mock.migrations, vec![(PartitionId(0), PartitionId(2))]);
        assert_eq!(rows.read(&mut mock, 6).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(rows.storage_partition(6).unwrap(), PartitionId(2));
    }

    #[test]
    fn busy_row_is_reported_not_serialised() {
        let s = scheduler(2, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 4, &MatrixConfig::default()).unwrap();
        let location = rows.row_address(1).unwrap();
        let slot = rows.inner.body.get(location).unwrap();
        let _held = slot.try_claim().unwrap();
        let mut mock = MockResident::home();
        assert_eq!(
            rows.append(&mut mock, 1, 9),
            Err(NodeletError::RowBusy { row: 1 })
        );
        // Other rows are unaffected.
        assert!(rows.append(&mut mock, 0, 9).is_ok());
    }

    #[test]
    fn out_of_range_row_fails_fast() {
        let s = scheduler(2, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 3, &MatrixConfig::default()).unwrap();
        assert_eq!(
            rows.row_address(3),
            Err(NodeletError::IndexOutOfRange { index: 3, len: 3 })
        );
        let mut mock = MockResident::home();
        assert!(rows.append(&mut mock, 4, 1).is_err());
        assert!(mock.migrations.is_empty());
    }

    #[test]
    fn last_handle_releases_everything() {
        let s = scheduler(4, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u64>::create(&mut ctx, 8, &MatrixConfig::with_row_reserve(4))
            .unwrap();
        let copy = rows.clone();
        drop(rows);
        assert!(s.machine().used_bytes() > 0);
        drop(copy);
        assert_eq!(s.machine().used_bytes(), 0);
        assert_eq!(s.machine().live_blocks(), 0);
    }

    #[test]
    fn context_from_another_machine_is_rejected_without_moving() {
        let s = scheduler(8, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 16, &MatrixConfig::default()).unwrap();

        let other = scheduler(2, 4096);
        let mut foreign = other.root();
        let expected = NodeletError::ForeignContext {
            expected: s.machine().id(),
            found: other.machine().id(),
        };
        assert_eq!(rows.append(&mut foreign, 13, 1), Err(expected.clone()));
        assert_eq!(rows.read(&mut foreign, 13), Err(expected.clone()));
        assert_eq!(rows.header(&foreign), Err(expected.clone()));
        assert_eq!(
            rows.spawn_on_row(&mut foreign, 13, |_, _| Ok(())),
            Err(expected)
        );
        assert_eq!(foreign.partition(), PartitionId::HOME);
        assert_eq!(foreign.outstanding(), 0);
        assert_eq!(other.migration_log().total_migrations(), 0);
        assert_eq!(rows.len_of(&mut ctx, 13).unwrap(), 0);
    }

    #[test]
    fn resident_beyond_the_machine_is_out_of_range() {
        let s = scheduler(2, 4096);
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 4, &MatrixConfig::default()).unwrap();
        let mut stray = MockResident::new(PartitionId(5));
        assert_eq!(
            rows.append(&mut stray, 1, 7),
            Err(NodeletError::IndexOutOfRange { index: 5, len: 2 })
        );
        assert!(stray.migrations.is_empty());
    }

    #[test]
    fn spawned_batches_run_inside_build_region() {
        let machine = Machine::new(MachineConfig::new(2).with_capacity(4096)).unwrap();
        let hooks = Arc::new(RecordingHooks::new());
        let s = Scheduler::with_hooks(&machine, SchedConfig::default(), hooks.clone()).unwrap();
        let mut ctx = s.root();
        let rows = PartitionedRows::<u32>::create(&mut ctx, 4, &MatrixConfig::default()).unwrap();
        rows.spawn_on_row(&mut ctx, 3, |task, rows| rows.extend(task, 3, &[1, 2]))
            .unwrap();
        ctx.join().unwrap();
        let events = hooks.events();
        assert_eq!(
            &events[2..],
            &[format!("+{BUILD_REGION}"), format!("-{BUILD_REGION}")]
        );
    }
}
