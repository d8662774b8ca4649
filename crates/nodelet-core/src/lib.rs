//! Core types for the Nodelet partitioned-memory model.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every other Nodelet crate: partition and block
//! identifiers, the row-index striping that maps a logical index onto a
//! `(partition, slot)` pair, the workspace-wide error type, and the
//! measurement-region hooks used to bracket logical phases.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod hooks;
pub mod id;
pub mod location;
pub mod traits;

pub use error::NodeletError;
pub use hooks::{NoopHooks, Region, RegionHooks, TracingHooks};
pub use id::{BlockId, MachineId, PartitionId};
pub use location::{Location, Striping};
pub use traits::Resident;

/// Column index type for sparse entries.
pub type Index = i64;

/// Scalar payload type for sparse entries and dense vectors.
pub type Scalar = i64;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, NodeletError>;
