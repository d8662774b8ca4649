//! Benchmark profiles for Nodelet.
//!
//! - [`bench_scheduler`]: a machine plus running scheduler of a given width
//! - [`dense_row`]: a deterministic row payload of any length

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use nodelet_arena::{Machine, MachineConfig};
use nodelet_core::{Index, NodeletError, Scalar};
use nodelet_sched::{SchedConfig, Scheduler};

/// Per-partition capacity used by every profile: 256 MiB.
pub const BENCH_PARTITION_BYTES: usize = 256 * 1024 * 1024;

/// A scheduler over `partitions` partitions with roomy heaps.
pub fn bench_scheduler(partitions: usize) -> Result<Scheduler, NodeletError> {
    let config = MachineConfig::new(partitions).with_capacity(BENCH_PARTITION_BYTES);
    let machine = Machine::new(config)?;
    Scheduler::new(&machine, SchedConfig::default())
}

/// `len` entries with strictly increasing columns.
pub fn dense_row(len: usize) -> Vec<(Index, Scalar)> {
    (0..len as Index).map(|c| (c * 3, c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_row_has_increasing_columns() {
        let row = dense_row(5);
        assert_eq!(row.len(), 5);
        assert!(row.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn bench_scheduler_starts() {
        let s = bench_scheduler(4).unwrap();
        assert_eq!(s.partitions(), 4);
    }
}
