//! Per-partition memory managers.
//!
//! A [`PartitionHeap`] is the local allocator of one partition. It tracks
//! how many bytes are reserved against a fixed capacity and counts every
//! reservation and release, which is how placement is observed: a byte
//! "lives" on the partition whose heap it was reserved from.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use nodelet_core::{NodeletError, PartitionId};

/// The local memory manager of one partition.
///
/// Reservations are lock-free and may come from any thread; a reservation
/// either fits entirely or fails without side effects.
#[derive(Debug)]
pub struct PartitionHeap {
    partition: PartitionId,
    capacity: usize,
    /// Bytes currently reserved.
    used: AtomicUsize,
    /// High-water mark of `used`.
    peak: AtomicUsize,
    /// Successful non-empty reservations.
    allocations: AtomicU64,
    /// Non-empty releases.
    releases: AtomicU64,
}

impl PartitionHeap {
    /// Create an empty heap for `partition` with `capacity` bytes.
    pub(crate) fn new(partition: PartitionId, capacity: usize) -> Self {
        Self {
            partition,
            capacity,
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Reserve `bytes` from this heap.
    ///
    /// Zero-byte reservations always succeed and are not counted.
    pub fn reserve(&self, bytes: usize) -> Result<(), NodeletError> {
        if bytes == 0 {
            return Ok(());
        }
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(n) if n <= self.capacity => n,
                _ => {
                    return Err(NodeletError::OutOfMemory {
                        partition: self.partition,
                        requested: bytes,
                        available: self.capacity - current,
                    })
                }
            };
            match self.used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    self.allocations.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Return `bytes` previously reserved from this heap.
    pub fn release(&self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let prev = self.used.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(
            prev >= bytes,
            "partition {} released {bytes} bytes with only {prev} reserved",
            self.partition
        );
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// The partition this heap serves.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently reserved.
    pub fn used_bytes(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.used_bytes()
    }

    /// Highest number of bytes ever reserved at once.
    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Number of successful non-empty reservations.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of non-empty releases.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release_track_usage() {
        let heap = PartitionHeap::new(PartitionId(1), 1024);
        heap.reserve(100).unwrap();
        heap.reserve(200).unwrap();
        assert_eq!(heap.used_bytes(), 300);
        assert_eq!(heap.remaining(), 724);
        heap.release(100);
        assert_eq!(heap.used_bytes(), 200);
        assert_eq!(heap.peak_bytes(), 300);
        assert_eq!(heap.allocations(), 2);
        assert_eq!(heap.releases(), 1);
    }

    #[test]
    fn exact_fit_succeeds() {
        let heap = PartitionHeap::new(PartitionId(0), 64);
        assert!(heap.reserve(64).is_ok());
        assert_eq!(heap.remaining(), 0);
    }

    #[test]
    fn overflow_reports_out_of_memory_without_side_effects() {
        let heap = PartitionHeap::new(PartitionId(2), 64);
        heap.reserve(40).unwrap();
        let err = heap.reserve(30).unwrap_err();
        assert_eq!(
            err,
            NodeletError::OutOfMemory {
                partition: PartitionId(2),
                requested: 30,
                available: 24,
            }
        );
        assert_eq!(heap.used_bytes(), 40);
        assert_eq!(heap.allocations(), 1);
    }

    #[test]
    fn zero_byte_requests_are_free() {
        let heap = PartitionHeap::new(PartitionId(0), 8);
        heap.reserve(0).unwrap();
        heap.release(0);
        assert_eq!(heap.allocations(), 0);
        assert_eq!(heap.releases(), 0);
    }

    #[test]
    fn concurrent_reservations_never_exceed_capacity() {
        let heap = std::sync::Arc::new(PartitionHeap::new(PartitionId(0), 1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let heap = std::sync::Arc::clone(&heap);
                std::thread::spawn(move || (0..50).filter(|_| heap.reserve(10).is_ok()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 100);
        assert_eq!(heap.used_bytes(), 1000);
    }
}
