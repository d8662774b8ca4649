//! Construction options for distributed row structures.

use nodelet_core::NodeletError;

/// Options applied when a matrix or vector set is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatrixConfig {
    /// Entries each row reserves from its owning partition during
    /// construction. Default: 0 (rows start with no local storage).
    ///
    /// The reservation is made inside the per-partition construction task,
    /// so a partition that cannot hold it fails the whole construction.
    pub row_reserve: usize,
}

impl MatrixConfig {
    /// Default per-row reservation.
    pub const DEFAULT_ROW_RESERVE: usize = 0;

    /// Largest accepted per-row reservation.
    pub const MAX_ROW_RESERVE: usize = 1 << 24;

    /// Reserve `entries` per row up front.
    pub fn with_row_reserve(entries: usize) -> Self {
        Self {
            row_reserve: entries,
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), NodeletError> {
        if self.row_reserve > Self::MAX_ROW_RESERVE {
            return Err(NodeletError::InvalidConfig {
                reason: format!(
                    "row_reserve must be at most {} (got {})",
                    Self::MAX_ROW_RESERVE,
                    self.row_reserve
                ),
            });
        }
        Ok(())
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            row_reserve: Self::DEFAULT_ROW_RESERVE,
        }
    }
}
