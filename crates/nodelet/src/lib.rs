//! Nodelet: partitioned memory placement and hinted task migration.
//!
//! A [`arena::Machine`] is a fixed set of memory partitions ("nodelets").
//! Work runs on a [`sched::Scheduler`] with one worker per partition; a task
//! that touches memory on another partition migrates there. Structures are
//! laid out so most accesses stay local, their headers are replicated on
//! every partition, and callers hint where a task should start before
//! spawning it.
//!
//! This is the facade crate that re-exports the public API of the Nodelet
//! sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use nodelet::prelude::*;
//!
//! let machine = Machine::new(MachineConfig::new(8)).unwrap();
//! let sched = Scheduler::new(&machine, SchedConfig::default()).unwrap();
//! let mut ctx = sched.root();
//!
//! let m = DistributedMatrix::create(&mut ctx, 16).unwrap();
//! assert_eq!(m.rows_per_partition(), 2);
//!
//! // Hint toward row 13's partition, spawn the builder there, join.
//! m.spawn_build(&mut ctx, 13, vec![(1, 1), (7, 1)]).unwrap();
//! ctx.join().unwrap();
//!
//! assert_eq!(m.storage_partition(13).unwrap(), PartitionId(5));
//! assert_eq!(m.row(&mut ctx, 13).unwrap(), vec![(1, 1), (7, 1)]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `nodelet-core` | IDs, locations, striping, errors, region hooks |
//! | [`arena`] | `nodelet-arena` | Machine, partition heaps, partitioned and replicated blocks |
//! | [`sched`] | `nodelet-sched` | Scheduler, task contexts, migration log |
//! | [`matrix`] | `nodelet-matrix` | Distributed matrix and vector set |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and traits (`nodelet-core`).
///
/// Contains [`types::PartitionId`], [`types::Location`], the
/// [`types::Striping`] index mapping, [`types::NodeletError`], and the
/// [`types::Resident`] trait.
pub use nodelet_core as types;

/// Partition heaps and typed allocations (`nodelet-arena`).
pub use nodelet_arena as arena;

/// Fork-join scheduling with migration hints (`nodelet-sched`).
///
/// [`sched::TaskContext`] carries `hint`, `spawn` and `join`.
pub use nodelet_sched as sched;

/// Row-striped distributed structures (`nodelet-matrix`).
pub use nodelet_matrix as matrix;

/// Common imports for typical Nodelet usage.
///
/// ```rust
/// use nodelet::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use nodelet_core::{
        Index, Location, NodeletError, PartitionId, Region, RegionHooks, Resident, Scalar,
        TracingHooks,
    };

    // Machine
    pub use nodelet_arena::{Machine, MachineConfig, Replicated};

    // Scheduling
    pub use nodelet_sched::{MigrationMap, SchedConfig, Scheduler, TaskContext};

    // Structures
    pub use nodelet_matrix::{DistributedMatrix, DistributedVectorSet, MatrixConfig};
}
