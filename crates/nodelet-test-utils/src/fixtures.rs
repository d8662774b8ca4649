//! Sparse-row fixtures for build scenarios.
//!
//! Even-indexed rows get [`EVEN_ROW`] (8 entries), odd-indexed rows get
//! [`ODD_ROW`] (7 entries). Every value is 1.

use nodelet_core::{Index, Scalar};

/// Entries appended to even-indexed rows.
pub const EVEN_ROW: [(Index, Scalar); 8] = [
    (0, 1),
    (3, 1),
    (5, 1),
    (7, 1),
    (12, 1),
    (14, 1),
    (27, 1),
    (31, 1),
];

/// Entries appended to odd-indexed rows.
pub const ODD_ROW: [(Index, Scalar); 7] = [
    (1, 1),
    (7, 1),
    (10, 1),
    (14, 1),
    (18, 1),
    (27, 1),
    (28, 1),
];

/// The fixture for `row`, chosen by parity.
pub fn fixture_row(row: usize) -> &'static [(Index, Scalar)] {
    if row % 2 == 0 {
        &EVEN_ROW
    } else {
        &ODD_ROW
    }
}
