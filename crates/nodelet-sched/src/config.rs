//! Scheduler configuration.

use nodelet_core::NodeletError;

/// Configuration for the partition worker pool.
#[derive(Clone, Debug)]
pub struct SchedConfig {
    /// Prefix for worker thread names; the partition ordinal is appended.
    /// Default: `"nodelet-worker"`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes. `None` uses the platform
    /// default.
    pub stack_size: Option<usize>,
}

impl SchedConfig {
    /// Default worker thread name prefix.
    pub const DEFAULT_THREAD_PREFIX: &'static str = "nodelet-worker";

    /// Smallest accepted explicit stack size.
    pub const MIN_STACK_SIZE: usize = 64 * 1024;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), NodeletError> {
        if self.thread_name_prefix.is_empty() {
            return Err(NodeletError::InvalidConfig {
                reason: "thread_name_prefix must not be empty".into(),
            });
        }
        if let Some(size) = self.stack_size {
            if size < Self::MIN_STACK_SIZE {
                return Err(NodeletError::InvalidConfig {
                    reason: format!(
                        "stack_size must be at least {} bytes (got {size})",
                        Self::MIN_STACK_SIZE
                    ),
                });
            }
        }
        Ok(())
    }

    /// Thread name for the worker serving partition `p`.
    pub fn thread_name(&self, p: usize) -> String {
        format!("{}-{p}", self.thread_name_prefix)
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: Self::DEFAULT_THREAD_PREFIX.to_string(),
            stack_size: None,
        }
    }
}
