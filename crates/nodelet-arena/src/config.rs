//! Machine configuration parameters.

use nodelet_core::NodeletError;

/// Configuration for a partitioned machine.
///
/// Resolved once at process start and threaded explicitly through every
/// constructor; nothing in the workspace queries the partition count from
/// ambient state. All values are immutable after the machine is built.
#[derive(Clone, Debug)]
pub struct MachineConfig {
    /// Number of memory partitions `P`.
    ///
    /// Default: 8. Must be in `1..=MAX_PARTITIONS`.
    pub partitions: usize,

    /// Capacity of each partition heap in bytes.
    ///
    /// Default: 64 MiB. Must be non-zero.
    pub partition_capacity_bytes: usize,
}

impl MachineConfig {
    /// Default partition count.
    pub const DEFAULT_PARTITIONS: usize = 8;

    /// Default per-partition heap capacity: 64 MiB.
    pub const DEFAULT_PARTITION_CAPACITY: usize = 64 * 1024 * 1024;

    /// Upper bound on the partition count.
    pub const MAX_PARTITIONS: usize = 256;

    /// Create a config with `partitions` partitions and default capacity.
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions,
            partition_capacity_bytes: Self::DEFAULT_PARTITION_CAPACITY,
        }
    }

    /// Override the per-partition heap capacity.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.partition_capacity_bytes = bytes;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), NodeletError> {
        if self.partitions == 0 || self.partitions > Self::MAX_PARTITIONS {
            return Err(NodeletError::InvalidConfig {
                reason: format!(
                    "partitions must be in 1..={} (got {})",
                    Self::MAX_PARTITIONS,
                    self.partitions
                ),
            });
        }
        if self.partition_capacity_bytes == 0 {
            return Err(NodeletError::InvalidConfig {
                reason: "partition_capacity_bytes must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Capacity summed over every partition.
    pub fn total_capacity_bytes(&self) -> usize {
        self.partitions.saturating_mul(self.partition_capacity_bytes)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PARTITIONS)
    }
}
