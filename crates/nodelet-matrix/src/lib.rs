//! Distributed row structures for Nodelet.
//!
//! [`DistributedMatrix`] holds `nrows` sparse rows of `(column, value)`
//! entries; [`DistributedVectorSet`] holds `len` scalar vectors. Both are
//! built on [`PartitionedRows`]:
//!
//! ```text
//!                 partition 0      partition 1   ...   partition P-1
//! header          RowsHeader       RowsHeader          RowsHeader      (replicated)
//! body slot 0     row 0            row 1               row P-1
//! body slot 1     row P            row P+1             row 2P-1
//! ...
//! ```
//!
//! Construction fans out one task per partition to build that partition's
//! slots locally and joins them before returning. Rows are then built by
//! hinting toward the row's partition and spawning a builder there.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod header;
pub mod matrix;
pub mod rows;
pub mod vector_set;

pub use config::MatrixConfig;
pub use header::RowsHeader;
pub use matrix::{DistributedMatrix, Entry};
pub use rows::{PartitionedRows, BUILD_REGION, CREATE_REGION};
pub use vector_set::DistributedVectorSet;
