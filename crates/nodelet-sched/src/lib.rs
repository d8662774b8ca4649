//! Fork-join scheduling with migration hints for Nodelet.
//!
//! One worker thread serves each partition. A [`TaskContext`] is the
//! execution state of one task: the partition it is resident on, a one-shot
//! migration hint, and the children it has spawned since its last join.
//!
//! # Protocol
//!
//! ```text
//! ctx.hint(location)   next spawn should start where `location` lives
//! ctx.spawn(task)      run `task` on the hinted partition (else the current one)
//! ctx.join()           wait for every child spawned since the last join
//! ```
//!
//! Migration-on-dereference is modelled explicitly: touching a location on
//! another partition relocates the context there and is counted in the
//! [`MigrationLog`]. Hinting before spawning lets the child start where its
//! data lives instead of migrating there on its first access.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod migration;
pub mod scheduler;
mod worker;

pub use config::SchedConfig;
pub use context::TaskContext;
pub use migration::{MigrationLog, MigrationMap};
pub use scheduler::Scheduler;
