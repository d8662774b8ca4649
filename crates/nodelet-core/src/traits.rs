//! The residency seam between storage and scheduling.
//!
//! Storage crates only need to know *where* the calling task is executing
//! and how to move it; they never see the scheduler itself. The task
//! context of `nodelet-sched` implements [`Resident`].

use crate::id::{MachineId, PartitionId};
use crate::location::Location;

/// Something that executes on exactly one partition at a time.
pub trait Resident {
    /// Partition the caller is currently resident on.
    fn partition(&self) -> PartitionId;

    /// The machine whose partitions this context moves between.
    ///
    /// `None` for contexts not bound to a machine, such as test doubles;
    /// those are only checked against the partition count.
    fn machine_id(&self) -> Option<MachineId> {
        None
    }

    /// Relocate execution to `partition`.
    ///
    /// A no-op when already resident. Otherwise this is one migration: it
    /// completes atomically before the caller's next access proceeds.
    fn relocate_to(&mut self, partition: PartitionId);

    /// Dereference `location`: migrate to its partition if not already there.
    fn touch(&mut self, location: Location) {
        if location.partition != self.partition() {
            self.relocate_to(location.partition);
        }
    }

    /// Whether `location` can be accessed without migrating.
    fn is_local(&self, location: Location) -> bool {
        location.partition == self.partition()
    }
}
