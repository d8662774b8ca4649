//! The partitioned machine: heaps plus the live-block registry.
//!
//! [`Machine`] wraps the platform primitives "reserve one block per
//! partition" and "reserve one replicated block". Both are all-or-nothing:
//! if any partition cannot satisfy its share, every share already reserved
//! is returned before the error propagates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use nodelet_core::{BlockId, MachineId, NodeletError, PartitionId, Resident, Striping};

use crate::config::MachineConfig;
use crate::descriptor::{BlockDescriptor, BlockKind, BlockRecord, BlockTable};
use crate::heap::PartitionHeap;

/// A fixed set of memory partitions and their local heaps.
///
/// Shared via `Arc`: every container keeps the machine alive until its own
/// storage has been returned.
#[derive(Debug)]
pub struct Machine {
    id: MachineId,
    config: MachineConfig,
    striping: Striping,
    heaps: Box<[PartitionHeap]>,
    blocks: Mutex<BlockTable>,
    next_block: AtomicU64,
}

impl Machine {
    /// Build a machine from a validated config.
    pub fn new(config: MachineConfig) -> Result<Arc<Self>, NodeletError> {
        config.validate()?;
        let heaps = (0..config.partitions)
            .map(|p| PartitionHeap::new(PartitionId(p as u32), config.partition_capacity_bytes))
            .collect();
        let machine = Self {
            id: MachineId::next(),
            striping: Striping::new(config.partitions),
            heaps,
            blocks: Mutex::new(BlockTable::new()),
            next_block: AtomicU64::new(1),
            config,
        };
        tracing::debug!(
            machine = %machine.id,
            partitions = machine.config.partitions,
            capacity = machine.config.partition_capacity_bytes,
            "machine created"
        );
        Ok(Arc::new(machine))
    }

    /// This machine's unique id.
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// The configuration the machine was built from.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Number of partitions `P`.
    pub fn partitions(&self) -> usize {
        self.heaps.len()
    }

    /// Index striping over this machine's partitions.
    pub fn striping(&self) -> Striping {
        self.striping
    }

    /// All partition ids, in order.
    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.heaps.iter().map(PartitionHeap::partition)
    }

    /// The local heap of `partition`.
    ///
    /// # Panics
    ///
    /// Panics if `partition` is not on this machine.
    pub fn heap(&self, partition: PartitionId) -> &PartitionHeap {
        &self.heaps[partition.index()]
    }

    /// Every partition heap, in partition order.
    pub fn heaps(&self) -> &[PartitionHeap] {
        &self.heaps
    }

    /// Check that `ctx` can address this machine's partitions.
    ///
    /// Rejects a context bound to another machine with `ForeignContext`,
    /// and a context resident on a partition this machine does not have
    /// with `IndexOutOfRange`.
    pub fn check_resident<R: Resident + ?Sized>(&self, ctx: &R) -> Result<(), NodeletError> {
        if let Some(found) = ctx.machine_id() {
            if found != self.id {
                return Err(NodeletError::ForeignContext {
                    expected: self.id,
                    found,
                });
            }
        }
        let partition = ctx.partition().index();
        if partition >= self.partitions() {
            return Err(NodeletError::IndexOutOfRange {
                index: partition,
                len: self.partitions(),
            });
        }
        Ok(())
    }

    /// Reserve `bytes_per_partition` on every partition.
    ///
    /// The returned descriptor is indexable by partition and owns all `P`
    /// shares. Fails with `OutOfMemory` if any share cannot be reserved;
    /// nothing stays reserved in that case.
    pub fn allocate_partitioned(
        &self,
        bytes_per_partition: usize,
    ) -> Result<BlockDescriptor, NodeletError> {
        self.allocate(BlockKind::Partitioned, bytes_per_partition)
    }

    /// Reserve one `bytes`-sized block with the same layout on every
    /// partition, for holding independent copies of one object.
    pub fn allocate_replicated(&self, bytes: usize) -> Result<BlockDescriptor, NodeletError> {
        self.allocate(BlockKind::Replicated, bytes)
    }

    fn allocate(&self, kind: BlockKind, bytes: usize) -> Result<BlockDescriptor, NodeletError> {
        for (reserved, heap) in self.heaps.iter().enumerate() {
            if let Err(e) = heap.reserve(bytes) {
                for undo in &self.heaps[..reserved] {
                    undo.release(bytes);
                }
                tracing::debug!(%kind, bytes, error = %e, "block allocation rolled back");
                return Err(e);
            }
        }

        let block = BlockId(self.next_block.fetch_add(1, Ordering::Relaxed));
        self.table().insert(
            block,
            BlockRecord {
                kind,
                bytes_per_partition: bytes,
            },
        );
        tracing::debug!(%block, %kind, bytes, "block allocated");
        Ok(BlockDescriptor {
            machine: self.id,
            block,
            kind,
            bytes_per_partition: bytes,
            partitions: self.partitions(),
        })
    }

    /// Free every share a descriptor owns.
    ///
    /// Returns `InvalidDescriptor` if the descriptor was issued by another
    /// machine or is not in the live table. That is a caller bug and must
    /// be treated as fatal.
    pub fn release(&self, descriptor: BlockDescriptor) -> Result<(), NodeletError> {
        let block = descriptor.block;
        if descriptor.machine != self.id {
            return Err(NodeletError::InvalidDescriptor { block });
        }
        let record = self
            .table()
            .remove(block)
            .ok_or(NodeletError::InvalidDescriptor { block })?;
        for heap in self.heaps.iter() {
            heap.release(record.bytes_per_partition);
        }
        tracing::debug!(%block, kind = %record.kind, "block released");
        Ok(())
    }

    /// Reserve `bytes` on a single partition's heap.
    pub fn reserve_local(&self, partition: PartitionId, bytes: usize) -> Result<(), NodeletError> {
        self.heap(partition).reserve(bytes)
    }

    /// Return `bytes` to a single partition's heap.
    pub fn release_local(&self, partition: PartitionId, bytes: usize) {
        self.heap(partition).release(bytes)
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.table().len()
    }

    /// Number of live blocks of `kind`.
    pub fn live_blocks_of(&self, kind: BlockKind) -> usize {
        self.table().count_kind(kind)
    }

    /// Whether `block` is currently live.
    pub fn is_live(&self, block: BlockId) -> bool {
        self.table().get(block).is_some()
    }

    /// Bytes in use summed over every partition.
    pub fn used_bytes(&self) -> usize {
        self.heaps.iter().map(PartitionHeap::used_bytes).sum()
    }

    fn table(&self) -> MutexGuard<'_, BlockTable> {
        // The table holds plain data; a panic mid-update cannot leave it
        // structurally invalid, so a poisoned lock is still usable.
        self.blocks.lock().unwrap_or_else(|p| p.into_inner())
    }
}
