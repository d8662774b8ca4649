//! Typed partitioned blocks: one slab of `T` per partition.
//!
//! A [`PartitionedBlock`] reserves `slots_per_partition * size_of::<T>()`
//! bytes on every partition up front, then each partition's slab is built
//! exactly once by a task resident on that partition. Until every slab is
//! built the block is not handed to callers, so no uninitialised slot is
//! ever observable through a finished structure.

use std::mem::size_of;
use std::sync::{Arc, OnceLock};

use nodelet_core::{BlockId, Location, NodeletError, PartitionId, Resident};

use crate::descriptor::BlockDescriptor;
use crate::machine::Machine;

/// Per-partition slabs of `T` backed by one partitioned descriptor.
pub struct PartitionedBlock<T> {
    machine: Arc<Machine>,
    /// `Some` until drop hands it back to the machine.
    descriptor: Option<BlockDescriptor>,
    slots_per_partition: usize,
    slabs: Box<[OnceLock<Box<[T]>>]>,
}

impl<T> PartitionedBlock<T> {
    /// Reserve room for `slots_per_partition` values of `T` on every
    /// partition of `machine`. No slab is built yet.
    pub fn allocate(
        machine: &Arc<Machine>,
        slots_per_partition: usize,
    ) -> Result<Self, NodeletError> {
        let bytes = slots_per_partition
            .checked_mul(size_of::<T>())
            .ok_or_else(|| NodeletError::InvalidArgument {
                reason: format!(
                    "{slots_per_partition} slots of {} bytes overflow usize",
                    size_of::<T>()
                ),
            })?;
        let descriptor = machine.allocate_partitioned(bytes)?;
        let slabs = (0..machine.partitions()).map(|_| OnceLock::new()).collect();
        Ok(Self {
            machine: Arc::clone(machine),
            descriptor: Some(descriptor),
            slots_per_partition,
            slabs,
        })
    }

    /// Build `partition`'s slab in place, constructing slot `s` with
    /// `init(s)`.
    ///
    /// The caller is relocated to `partition` first, so construction runs
    /// locally. Building a slab twice is rejected.
    pub fn init_local<R, F>(
        &self,
        ctx: &mut R,
        partition: PartitionId,
        init: F,
    ) -> Result<(), NodeletError>
    where
        R: Resident + ?Sized,
        F: FnMut(usize) -> Result<T, NodeletError>,
    {
        let slab = self
            .slabs
            .get(partition.index())
            .ok_or(NodeletError::IndexOutOfRange {
                index: partition.index(),
                len: self.slabs.len(),
            })?;
        ctx.touch(Location::base_of(partition));
        let built = (0..self.slots_per_partition)
            .map(init)
            .collect::<Result<Box<[T]>, NodeletError>>()?;
        slab.set(built).map_err(|_| NodeletError::InvalidArgument {
            reason: format!("slab for partition {partition} is already built"),
        })
    }

    /// The slot at `location`, if its slab has been built.
    pub fn get(&self, location: Location) -> Option<&T> {
        self.slab(location.partition)?.get(location.offset)
    }

    /// `partition`'s slab, if built.
    pub fn slab(&self, partition: PartitionId) -> Option<&[T]> {
        self.slabs.get(partition.index())?.get().map(|s| &**s)
    }

    /// Number of slabs built so far.
    pub fn built_partitions(&self) -> usize {
        self.slabs.iter().filter(|s| s.get().is_some()).count()
    }

    /// Whether every partition's slab has been built.
    pub fn is_complete(&self) -> bool {
        self.built_partitions() == self.slabs.len()
    }

    /// Slots on each partition, padding included.
    pub fn slots_per_partition(&self) -> usize {
        self.slots_per_partition
    }

    /// Number of partitions spanned.
    pub fn partitions(&self) -> usize {
        self.slabs.len()
    }

    /// The block id of the backing descriptor.
    pub fn block(&self) -> Option<BlockId> {
        self.descriptor.as_ref().map(BlockDescriptor::block)
    }

    /// The machine the block was reserved on.
    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }
}

impl<T> Drop for PartitionedBlock<T> {
    fn drop(&mut self) {
        // Slots first: their own local storage goes back before the block.
        for slab in self.slabs.iter_mut() {
            drop(slab.take());
        }
        if let Some(descriptor) = self.descriptor.take() {
            if let Err(e) = self.machine.release(descriptor) {
                tracing::error!(error = %e, "failed to release partitioned block");
                debug_assert!(false, "failed to release partitioned block: {e}");
            }
        }
    }
}
