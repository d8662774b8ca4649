//! Partitioned and replicated allocation for Nodelet.
//!
//! A [`Machine`] owns one [`PartitionHeap`] per memory partition. It is the
//! only component that reserves or returns partition memory; every typed
//! container in this crate goes through it.
//!
//! # Architecture
//!
//! ```text
//! Machine (config resolved once, P partitions)
//! ├── PartitionHeap × P (capacity, bytes in use, alloc/release counters)
//! └── BlockTable (BlockId → BlockRecord, the live-descriptor registry)
//!
//! PartitionedBlock<T>  one slab of T per partition, each built locally
//! Replicated<T>        one identical copy of T per partition, read-only
//! LocalVec<E>          growable storage charged to a single partition
//! ExclusiveCell<T>     claim-or-fail cell for single-writer slots
//! ```
//!
//! # Safety
//!
//! All storage is ordinary Rust containers with accounting on the side.
//! The one bounded `unsafe` region is `raw.rs` ([`ExclusiveCell`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod config;
pub mod descriptor;
pub mod heap;
pub mod local_vec;
pub mod machine;
pub mod partitioned;
mod raw;
pub mod replicated;

// Public re-exports for the primary API surface.
pub use config::MachineConfig;
pub use descriptor::{BlockDescriptor, BlockKind};
pub use heap::PartitionHeap;
pub use local_vec::LocalVec;
pub use machine::Machine;
pub use partitioned::PartitionedBlock;
pub use raw::{Claim, ExclusiveCell};
pub use replicated::Replicated;
