//! Error types for the Nodelet workspace.
//!
//! One enum covers allocation, addressing, and scheduling failures so that
//! a join over heterogeneous tasks can report any of them to the spawner.

use std::error::Error;
use std::fmt;

use crate::id::{BlockId, MachineId, PartitionId};

/// Errors raised by allocation, addressing, and task scheduling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeletError {
    /// A partition heap could not satisfy a reservation. Partitioned and
    /// replicated allocations are all-or-nothing, so nothing stays reserved.
    OutOfMemory {
        /// The partition whose heap was exhausted.
        partition: PartitionId,
        /// Bytes requested from that partition.
        requested: usize,
        /// Bytes still free on that partition at the time of the request.
        available: usize,
    },
    /// A row or vector index outside `[0, len)`.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of valid indices.
        len: usize,
    },
    /// Release of a descriptor the machine does not currently own.
    ///
    /// This is a caller bug and must be treated as fatal.
    InvalidDescriptor {
        /// The block named by the descriptor.
        block: BlockId,
    },
    /// A task context from one machine was used on a structure of another.
    ForeignContext {
        /// The machine the structure lives on.
        expected: MachineId,
        /// The machine the context runs on.
        found: MachineId,
    },
    /// A row was accessed while another task was appending to it.
    ///
    /// Callers must serialise access to a single row; this reports a
    /// violation instead of silently serialising it.
    RowBusy {
        /// The contended row.
        row: usize,
    },
    /// A configuration value failed validation.
    InvalidConfig {
        /// Description of the invalid setting.
        reason: String,
    },
    /// An argument to a constructor or operation was rejected.
    InvalidArgument {
        /// Description of the invalid argument.
        reason: String,
    },
    /// A spawned task panicked. Reported at the join point.
    TaskPanicked {
        /// Partition whose worker ran the task.
        partition: PartitionId,
    },
    /// A task was spawned after the scheduler stopped accepting work.
    SchedulerStopped,
    /// A partition worker thread could not be started.
    ThreadSpawnFailed {
        /// Partition the worker was meant to serve.
        partition: PartitionId,
        /// OS-level failure description.
        reason: String,
    },
}

impl fmt::Display for NodeletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                partition,
                requested,
                available,
            } => write!(
                f,
                "out of memory on partition {partition}: requested {requested} bytes, {available} available"
            ),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range (len={len})")
            }
            Self::InvalidDescriptor { block } => {
                write!(f, "invalid descriptor: block {block} is not live on this machine")
            }
            Self::ForeignContext { expected, found } => {
                write!(f, "context of machine {found} used on machine {expected}")
            }
            Self::RowBusy { row } => {
                write!(f, "row {row} is being appended to by another task")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid config: {reason}"),
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::TaskPanicked { partition } => {
                write!(f, "task panicked on partition {partition}")
            }
            Self::SchedulerStopped => write!(f, "scheduler is no longer accepting tasks"),
            Self::ThreadSpawnFailed { partition, reason } => {
                write!(f, "failed to start worker for partition {partition}: {reason}")
            }
        }
    }
}

impl Error for NodeletError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_display_names_partition() {
        let e = NodeletError::OutOfMemory {
            partition: PartitionId(3),
            requested: 128,
            available: 64,
        };
        let msg = e.to_string();
        assert!(msg.contains("partition 3"));
        assert!(msg.contains("128"));
    }

    #[test]
    fn index_out_of_range_display() {
        let e = NodeletError::IndexOutOfRange { index: 16, len: 16 };
        assert_eq!(e.to_string(), "index 16 out of range (len=16)");
    }

    #[test]
    fn foreign_context_display_names_both_machines() {
        let a = MachineId::next();
        let b = MachineId::next();
        let msg = NodeletError::ForeignContext {
            expected: a,
            found: b,
        }
        .to_string();
        assert_eq!(msg, format!("context of machine {b} used on machine {a}"));
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(
            NodeletError::RowBusy { row: 2 },
            NodeletError::RowBusy { row: 2 }
        );
        assert_ne!(
            NodeletError::TaskPanicked {
                partition: PartitionId(1)
            },
            NodeletError::SchedulerStopped
        );
    }
}
