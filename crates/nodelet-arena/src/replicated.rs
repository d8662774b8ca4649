//! Replicated values: one read-only copy per partition.
//!
//! [`Replicated`] builds a value once on the home partition, then copies it
//! onto every other partition. Any task can read the copy on the partition
//! it is currently resident on, so reading the value never migrates. There
//! is no update-all-replicas operation: the value is written once, at
//! construction, and read many times from many partitions.

use std::mem::size_of;
use std::sync::Arc;

use nodelet_core::{BlockId, NodeletError, PartitionId, Resident};

use crate::descriptor::BlockDescriptor;
use crate::machine::Machine;

/// A value copied identically onto every partition of a machine.
pub struct Replicated<T> {
    machine: Arc<Machine>,
    /// `Some` until drop hands it back to the machine.
    descriptor: Option<BlockDescriptor>,
    /// `copies[p]` lives on partition `p`.
    copies: Box<[T]>,
}

impl<T: Clone> Replicated<T> {
    /// Place `value` on the home partition and copy it to the other `P-1`.
    ///
    /// After this returns, every partition observes identical field values.
    /// Fails with `OutOfMemory` if any partition cannot hold its copy.
    pub fn new(machine: &Arc<Machine>, value: T) -> Result<Self, NodeletError> {
        let descriptor = machine.allocate_replicated(size_of::<T>())?;
        let partitions = machine.partitions();
        let mut copies = Vec::with_capacity(partitions);
        for _ in 1..partitions {
            copies.push(value.clone());
        }
        copies.insert(0, value);
        Ok(Self {
            machine: Arc::clone(machine),
            descriptor: Some(descriptor),
            copies: copies.into_boxed_slice(),
        })
    }
}

impl<T> Replicated<T> {
    /// The copy on the caller's current partition. Never migrates.
    ///
    /// Fails with `ForeignContext` for a context bound to another machine
    /// and `IndexOutOfRange` for one resident on a partition this machine
    /// does not have.
    pub fn get<R: Resident + ?Sized>(&self, ctx: &R) -> Result<&T, NodeletError> {
        self.machine.check_resident(ctx)?;
        let partition = ctx.partition().index();
        self.copies
            .get(partition)
            .ok_or(NodeletError::IndexOutOfRange {
                index: partition,
                len: self.copies.len(),
            })
    }

    /// The copy resident on `partition`.
    pub fn replica(&self, partition: PartitionId) -> Option<&T> {
        self.copies.get(partition.index())
    }

    /// The home partition's copy.
    pub fn home(&self) -> &T {
        &self.copies[PartitionId::HOME.index()]
    }

    /// Every copy, in partition order.
    pub fn replicas(&self) -> &[T] {
        &self.copies
    }

    /// The block id of the backing replicated descriptor.
    pub fn block(&self) -> Option<BlockId> {
        self.descriptor.as_ref().map(BlockDescriptor::block)
    }
}

impl<T: PartialEq> Replicated<T> {
    /// Whether every copy equals the home copy.
    pub fn is_coherent(&self) -> bool {
        let home = self.home();
        self.copies.iter().all(|c| c == home)
    }
}

impl<T> Drop for Replicated<T> {
    fn drop(&mut self) {
        if let Some(descriptor) = self.descriptor.take() {
            if let Err(e) = self.machine.release(descriptor) {
                tracing::error!(error = %e, "failed to release replicated block");
                debug_assert!(false, "failed to release replicated block: {e}");
            }
        }
    }
}
