//! Tagged locations and the round-robin index striping.
//!
//! A logical index `i` is striped across `P` partitions: it lives on
//! partition `i mod P` in slot `i div P`. [`Striping`] captures `P` once and
//! exposes the mapping in both directions, so no code outside this module
//! does the arithmetic by hand.

use std::fmt;

use crate::error::NodeletError;
use crate::id::PartitionId;

/// A partition-tagged address: which partition, and where inside it.
///
/// This replaces selecting a partition from pointer bits. Following a
/// `Location` from a task resident elsewhere is what triggers a migration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    /// Partition holding the addressed storage.
    pub partition: PartitionId,
    /// Offset within that partition's block, in elements.
    pub offset: usize,
}

impl Location {
    /// Build a location.
    pub fn new(partition: PartitionId, offset: usize) -> Self {
        Self { partition, offset }
    }

    /// The base of `partition`'s block.
    pub fn base_of(partition: PartitionId) -> Self {
        Self::new(partition, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}+{}", self.partition, self.offset)
    }
}

/// Round-robin mapping of logical indices onto partitions.
///
/// Fixed for the lifetime of any structure built with it. Restricted to
/// `[0, nrows)` the mapping is a bijection onto the `(partition, slot)`
/// pairs actually in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Striping {
    partitions: usize,
}

impl Striping {
    /// Create a striping over `partitions` partitions.
    ///
    /// # Panics
    ///
    /// Panics if `partitions` is zero. Machine configuration rejects a zero
    /// partition count long before a striping is built.
    pub fn new(partitions: usize) -> Self {
        assert!(partitions > 0, "striping requires at least one partition");
        Self { partitions }
    }

    /// Number of partitions `P`.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Partition owning logical index `index`: `index mod P`.
    pub fn owner(&self, index: usize) -> PartitionId {
        PartitionId((index % self.partitions) as u32)
    }

    /// Slot of `index` within its owning partition: `index div P`.
    pub fn slot(&self, index: usize) -> usize {
        index / self.partitions
    }

    /// Owner and slot together.
    pub fn location(&self, index: usize) -> Location {
        Location::new(self.owner(index), self.slot(index))
    }

    /// Inverse of [`Striping::location`].
    pub fn index_of(&self, location: Location) -> usize {
        location.offset * self.partitions + location.partition.index()
    }

    /// Slots each partition needs for `len` logical indices: `ceil(len / P)`.
    pub fn slots_per_partition(&self, len: usize) -> usize {
        len.div_ceil(self.partitions)
    }

    /// Number of slots on `partition` that map to a valid index below `len`.
    ///
    /// The remaining `slots_per_partition(len) - valid_slots(..)` slots are
    /// padding.
    pub fn valid_slots(&self, partition: PartitionId, len: usize) -> usize {
        let p = partition.index();
        if p >= len {
            0
        } else {
            (len - p).div_ceil(self.partitions)
        }
    }

    /// Map `index` to its location, failing fast if it is outside `[0, len)`.
    pub fn checked_location(&self, index: usize, len: usize) -> Result<Location, NodeletError> {
        if index >= len {
            return Err(NodeletError::IndexOutOfRange { index, len });
        }
        Ok(self.location(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_rows_over_eight_partitions() {
        let s = Striping::new(8);
        assert_eq!(s.slots_per_partition(16), 2);
        assert_eq!(s.location(2), Location::new(PartitionId(2), 0));
        assert_eq!(s.location(13), Location::new(PartitionId(5), 1));
    }

    #[test]
    fn ceil_division_pads_trailing_slots() {
        let s = Striping::new(8);
        assert_eq!(s.slots_per_partition(17), 3);
        assert_eq!(s.valid_slots(PartitionId(0), 17), 3);
        assert_eq!(s.valid_slots(PartitionId(1), 17), 2);
        assert_eq!(s.valid_slots(PartitionId(7), 17), 2);
    }

    #[test]
    fn fewer_rows_than_partitions() {
        let s = Striping::new(8);
        assert_eq!(s.slots_per_partition(3), 1);
        assert_eq!(s.valid_slots(PartitionId(2), 3), 1);
        assert_eq!(s.valid_slots(PartitionId(3), 3), 0);
    }

    #[test]
    fn checked_location_rejects_out_of_range() {
        let s = Striping::new(4);
        assert!(s.checked_location(3, 4).is_ok());
        assert_eq!(
            s.checked_location(4, 4),
            Err(NodeletError::IndexOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    #[should_panic(expected = "at least one partition")]
    fn zero_partitions_rejected() {
        Striping::new(0);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashSet;

        proptest! {
            #[test]
            fn mapping_is_a_bijection(partitions in 1usize..17, len in 1usize..500) {
                let s = Striping::new(partitions);
                let per = s.slots_per_partition(len);
                let mut seen = HashSet::new();
                for i in 0..len {
                    let loc = s.location(i);
                    prop_assert!(loc.partition.index() < partitions);
                    prop_assert!(loc.offset < per);
                    prop_assert_eq!(s.index_of(loc), i);
                    prop_assert!(seen.insert(loc));
                }
                let valid: usize = (0..partitions)
                    .map(|p| s.valid_slots(PartitionId(p as u32), len))
                    .sum();
                prop_assert_eq!(valid, len);
            }
        }
    }
}
