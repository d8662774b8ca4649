//! Block descriptors and the live-block table.
//!
//! A [`BlockDescriptor`] is the caller's proof of ownership of one
//! allocation spanning every partition. It is move-only: the only way to
//! give it back is [`Machine::release`](crate::Machine::release), which
//! consumes it. The [`BlockTable`] is the machine-side registry of
//! descriptors that are currently live.

use std::fmt;

use indexmap::IndexMap;
use nodelet_core::{BlockId, Location, MachineId, PartitionId};

/// How a block's per-partition storage is meant to be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Distinct per-partition bodies (`block[p]` is partition `p`'s share).
    Partitioned,
    /// Identical layout on every partition, holding copies of one object.
    /// The copies are independent storage; "replicated" describes
    /// placement, not coherence.
    Replicated,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partitioned => write!(f, "partitioned"),
            Self::Replicated => write!(f, "replicated"),
        }
    }
}

/// Ownership token for one block: `P` equal-size reservations, one fully
/// resident on each partition.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a descriptor without releasing it leaks partition memory"]
pub struct BlockDescriptor {
    pub(crate) machine: MachineId,
    pub(crate) block: BlockId,
    pub(crate) kind: BlockKind,
    pub(crate) bytes_per_partition: usize,
    pub(crate) partitions: usize,
}

impl BlockDescriptor {
    /// The block this descriptor owns.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The machine that issued this descriptor.
    pub fn machine(&self) -> MachineId {
        self.machine
    }

    /// Partitioned or replicated.
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Size of each partition's share in bytes.
    pub fn bytes_per_partition(&self) -> usize {
        self.bytes_per_partition
    }

    /// Number of partitions spanned (always the machine's `P`).
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Local base address of the block on `partition`: `descriptor[p]`.
    ///
    /// Returns `None` if `partition` is not on this machine.
    pub fn base(&self, partition: PartitionId) -> Option<Location> {
        (partition.index() < self.partitions).then(|| Location::base_of(partition))
    }
}

impl fmt::Display for BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block({}, {}, {}B x {})",
            self.block, self.kind, self.bytes_per_partition, self.partitions
        )
    }
}

/// Machine-side record of a live block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    /// Partitioned or replicated.
    pub kind: BlockKind,
    /// Bytes reserved on each partition.
    pub bytes_per_partition: usize,
}

/// Registry of live blocks, in allocation order.
///
/// Uses `IndexMap` so diagnostics list blocks deterministically.
#[derive(Debug, Default)]
pub struct BlockTable {
    entries: IndexMap<BlockId, BlockRecord>,
}

impl BlockTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly reserved block.
    pub fn insert(&mut self, block: BlockId, record: BlockRecord) {
        self.entries.insert(block, record);
    }

    /// Unregister a block, returning its record if it was live.
    pub fn remove(&mut self, block: BlockId) -> Option<BlockRecord> {
        self.entries.shift_remove(&block)
    }

    /// Look up a live block.
    pub fn get(&self, block: BlockId) -> Option<&BlockRecord> {
        self.entries.get(&block)
    }

    /// Iterate over live blocks in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &BlockRecord)> {
        self.entries.iter()
    }

    /// Number of live blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no blocks are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live blocks of `kind`.
    pub fn count_kind(&self, kind: BlockKind) -> usize {
        self.entries.values().filter(|r| r.kind == kind).count()
    }
}
