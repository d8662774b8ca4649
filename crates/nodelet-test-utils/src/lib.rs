//! Test utilities and mock types for Nodelet development.
//!
//! Provides the sparse-row fixtures used by the build scenarios, a
//! [`MockResident`] that records migrations without a scheduler, and
//! [`RecordingHooks`] for asserting on measurement-region markers, and
//! subscriber helpers for seeing `tracing` output from tests and demos.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod logging;

use std::sync::Mutex;

use nodelet_core::{MachineId, PartitionId, RegionHooks, Resident};

pub use fixtures::{fixture_row, EVEN_ROW, ODD_ROW};
pub use logging::{init_subscriber, init_test_subscriber};

/// A [`Resident`] that is not backed by any thread.
///
/// Starts on a chosen partition and logs every relocation as a
/// `(from, to)` pair, which is enough to check placement logic of storage
/// types in isolation.
#[derive(Debug)]
pub struct MockResident {
    partition: PartitionId,
    machine: Option<MachineId>,
    pub migrations: Vec<(PartitionId, PartitionId)>,
}

impl MockResident {
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            machine: None,
            migrations: Vec::new(),
        }
    }

    /// Claim to run on `machine`, so machine checks can be exercised.
    pub fn bound_to(mut self, machine: MachineId) -> Self {
        self.machine = Some(machine);
        self
    }

    /// A resident starting on the home partition.
    pub fn home() -> Self {
        Self::new(PartitionId::HOME)
    }
}

impl Resident for MockResident {
    fn partition(&self) -> PartitionId {
        self.partition
    }

    fn machine_id(&self) -> Option<MachineId> {
        self.machine
    }

    fn relocate_to(&mut self, partition: PartitionId) {
        if partition != self.partition {
            self.migrations.push((self.partition, partition));
            self.partition = partition;
        }
    }
}

/// Records every begin/end marker as `"+name"` / `"-name"`.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers seen so far, in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl RegionHooks for RecordingHooks {
    fn begin(&self, name: &str) {
        if let Ok(mut e) = self.events.lock() {
            e.push(format!("+{name}"));
        }
    }

    fn end(&self, name: &str) {
        if let Ok(mut e) = self.events.lock() {
            e.push(format!("-{name}"));
        }
    }
}
