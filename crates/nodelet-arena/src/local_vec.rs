//! Growable storage owned by a single partition.
//!
//! [`LocalVec`] is the backing store of one row. Every capacity change is
//! reserved from, and returned to, the heap of the partition the vector was
//! created on and of no other partition. A task that migrates once to the
//! owning partition and then appends 200 entries performs 200 local
//! operations, with any growth charged locally.

use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use nodelet_core::{NodeletError, PartitionId};

use crate::machine::Machine;

/// Smallest capacity reserved by the first growth.
const MIN_GROWTH: usize = 4;

/// An insertion-ordered, append-only sequence resident on one partition.
pub struct LocalVec<E> {
    machine: Arc<Machine>,
    partition: PartitionId,
    items: Vec<E>,
    /// Capacity (in elements) currently charged to the partition heap.
    reserved: usize,
    /// Number of times the reservation has grown.
    growths: u32,
}

impl<E> LocalVec<E> {
    /// An empty vector on `partition` with nothing reserved.
    pub fn new(machine: Arc<Machine>, partition: PartitionId) -> Self {
        Self {
            machine,
            partition,
            items: Vec::new(),
            reserved: 0,
            growths: 0,
        }
    }

    /// An empty vector on `partition` with room for `capacity` elements
    /// reserved up front.
    pub fn with_capacity(
        machine: Arc<Machine>,
        partition: PartitionId,
        capacity: usize,
    ) -> Result<Self, NodeletError> {
        let mut v = Self::new(machine, partition);
        if capacity > 0 {
            v.grow_to(capacity)?;
        }
        Ok(v)
    }

    /// Append one element, growing the local reservation if needed.
    pub fn push(&mut self, item: E) -> Result<(), NodeletError> {
        if self.items.len() == self.reserved {
            self.grow_to(self.items.len() + 1)?;
        }
        self.items.push(item);
        Ok(())
    }

    /// Append every element of `items` in order, with at most one growth.
    ///
    /// Either all elements are appended or, on `OutOfMemory`, none are.
    pub fn extend_from_slice(&mut self, items: &[E]) -> Result<(), NodeletError>
    where
        E: Clone,
    {
        let needed = self.items.len() + items.len();
        if needed > self.reserved {
            self.grow_to(needed)?;
        }
        self.items.extend_from_slice(items);
        Ok(())
    }

    /// Reallocate so at least `min_capacity` elements fit.
    ///
    /// The new reservation is taken before the old one is returned, like a
    /// realloc that cannot grow in place.
    fn grow_to(&mut self, min_capacity: usize) -> Result<(), NodeletError> {
        let new_cap = min_capacity
            .max(self.reserved.saturating_mul(2))
            .max(MIN_GROWTH);
        let new_bytes = new_cap
            .checked_mul(size_of::<E>())
            .ok_or_else(|| NodeletError::OutOfMemory {
                partition: self.partition,
                requested: usize::MAX,
                available: self.machine.heap(self.partition).remaining(),
            })?;
        self.machine.reserve_local(self.partition, new_bytes)?;
        self.machine.release_local(self.partition, self.reserved_bytes());
        self.items.reserve_exact(new_cap - self.items.len());
        self.reserved = new_cap;
        self.growths += 1;
        Ok(())
    }

    /// The partition whose heap backs this vector.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Elements in insertion order.
    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no elements have been appended.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Capacity charged to the partition heap, in elements.
    pub fn capacity(&self) -> usize {
        self.reserved
    }

    /// Capacity charged to the partition heap, in bytes.
    pub fn reserved_bytes(&self) -> usize {
        self.reserved * size_of::<E>()
    }

    /// How many times the reservation has grown.
    pub fn growths(&self) -> u32 {
        self.growths
    }
}

impl<E> Drop for LocalVec<E> {
    fn drop(&mut self) {
        self.machine.release_local(self.partition, self.reserved_bytes());
    }
}

impl<E: fmt::Debug> fmt::Debug for LocalVec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalVec")
            .field("partition", &self.partition)
            .field("items", &self.items)
            .field("reserved", &self.reserved)
            .finish()
    }
}
