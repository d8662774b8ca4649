//! Strongly-typed identifiers for partitions, machines, and blocks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordinal of a memory partition ("nodelet"), in `0..P`.
///
/// The partition count `P` is fixed when the machine is built and never
/// changes for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// The home partition: where replicated objects are first built and
    /// where the root task starts.
    pub const HOME: PartitionId = PartitionId(0);

    /// The ordinal as a `usize`, for indexing per-partition tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PartitionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`MachineId`] allocation.
static MACHINE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a machine.
///
/// Descriptors carry the id of the machine that issued them so a release
/// against the wrong machine is detected instead of corrupting its heaps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(u64);

impl MachineId {
    /// Allocate a fresh, process-unique machine id. Thread-safe.
    pub fn next() -> Self {
        Self(MACHINE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one live allocation (partitioned or replicated) on a machine.
///
/// Block ids are issued sequentially per machine and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for BlockId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_ids_are_unique() {
        let a = MachineId::next();
        let b = MachineId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn partition_index_matches_ordinal() {
        assert_eq!(PartitionId(5).index(), 5);
        assert_eq!(PartitionId::HOME, PartitionId(0));
    }

    #[test]
    fn display_formats() {
        assert_eq!(PartitionId(3).to_string(), "3");
        assert_eq!(BlockId(12).to_string(), "#12");
    }
}
