//! Claim-or-fail cells for single-writer storage slots.
//!
//! A partition-local slot (one row, one vector) is written only by the task
//! currently appending to it, and callers are responsible for never running
//! two such tasks on the same slot at once. [`ExclusiveCell`] does not
//! serialise them: a second claimant is turned away immediately, so the
//! violation surfaces as an error rather than as a data race.
//!
//! This is the one module in the crate that contains `unsafe` code.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// A value that at most one holder may access at a time.
///
/// Unlike a mutex, [`ExclusiveCell::try_claim`] never waits.
pub struct ExclusiveCell<T> {
    claimed: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` only happens through a `Claim`, and at most one
// `Claim` exists at a time (enforced by the `claimed` flag). Sending the
// cell moves `T`, so `T: Send` is required, as for `Mutex<T>`.
unsafe impl<T: Send> Send for ExclusiveCell<T> {}

// SAFETY: sharing `&ExclusiveCell<T>` lets another thread obtain a `Claim`
// and therefore `&mut T`, which is a transfer of `T` across threads.
// Exclusivity comes from the `claimed` flag, so `T: Send` suffices.
unsafe impl<T: Send> Sync for ExclusiveCell<T> {}

impl<T> ExclusiveCell<T> {
    /// Wrap `value` in an unclaimed cell.
    pub fn new(value: T) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Claim exclusive access, or return `None` if someone else holds it.
    pub fn try_claim(&self) -> Option<Claim<'_, T>> {
        self.claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Claim { cell: self })
    }

    /// Whether a claim is currently outstanding.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Direct access through a unique borrow; no claim needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the cell and return the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for ExclusiveCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ExclusiveCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveCell")
            .field("claimed", &self.is_claimed())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the value of an [`ExclusiveCell`]; released on drop.
#[must_use = "the claim is released as soon as it is dropped"]
pub struct Claim<'a, T> {
    cell: &'a ExclusiveCell<T>,
}

impl<T> Deref for Claim<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this claim holds the `claimed` flag, so no other `Claim`
        // (and hence no other reference into `value`) exists.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for Claim<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`; `&mut self` rules out aliasing through
        // this claim.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        self.cell.claimed.store(false, Ordering::Release);
    }
}
