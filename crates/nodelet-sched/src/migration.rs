//! Migration and spawn accounting.
//!
//! [`MigrationLog`] keeps two `P × P` counter matrices: migrations
//! (`from → to` relocations of a running task) and spawns (`from → to`
//! placements of a new task). Row `from`, column `to`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use nodelet_core::PartitionId;

/// Lock-free `P × P` migration and spawn counters.
#[derive(Debug)]
pub struct MigrationLog {
    partitions: usize,
    migrations: Box<[AtomicU64]>,
    spawns: Box<[AtomicU64]>,
}

impl MigrationLog {
    /// Zeroed counters for `partitions` partitions.
    pub fn new(partitions: usize) -> Self {
        let cells = partitions * partitions;
        Self {
            partitions,
            migrations: (0..cells).map(|_| AtomicU64::new(0)).collect(),
            spawns: (0..cells).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn cell(&self, from: PartitionId, to: PartitionId) -> usize {
        debug_assert!(from.index() < self.partitions && to.index() < self.partitions);
        from.index() * self.partitions + to.index()
    }

    /// Count one relocation of a running task.
    pub fn record_migration(&self, from: PartitionId, to: PartitionId) {
        self.migrations[self.cell(from, to)].fetch_add(1, Ordering::Relaxed);
    }

    /// Count one task spawned from `from` and placed on `to`.
    pub fn record_spawn(&self, from: PartitionId, to: PartitionId) {
        self.spawns[self.cell(from, to)].fetch_add(1, Ordering::Relaxed);
    }

    /// Migrations `from → to` so far.
    pub fn migrations(&self, from: PartitionId, to: PartitionId) -> u64 {
        self.migrations[self.cell(from, to)].load(Ordering::Relaxed)
    }

    /// Spawns `from → to` so far.
    pub fn spawns(&self, from: PartitionId, to: PartitionId) -> u64 {
        self.spawns[self.cell(from, to)].load(Ordering::Relaxed)
    }

    /// All migrations so far.
    pub fn total_migrations(&self) -> u64 {
        self.migrations.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// All spawns so far.
    pub fn total_spawns(&self) -> u64 {
        self.spawns.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Number of partitions covered.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> MigrationMap {
        MigrationMap {
            partitions: self.partitions,
            migrations: self.migrations.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
            spawns: self.spawns.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for c in self.migrations.iter().chain(self.spawns.iter()) {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time copy of a [`MigrationLog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationMap {
    partitions: usize,
    migrations: Vec<u64>,
    spawns: Vec<u64>,
}

impl MigrationMap {
    /// Migrations `from → to`.
    pub fn migrations(&self, from: PartitionId, to: PartitionId) -> u64 {
        self.migrations[from.index() * self.partitions + to.index()]
    }

    /// Spawns `from → to`.
    pub fn spawns(&self, from: PartitionId, to: PartitionId) -> u64 {
        self.spawns[from.index() * self.partitions + to.index()]
    }

    /// Sum of all migrations.
    pub fn total_migrations(&self) -> u64 {
        self.migrations.iter().sum()
    }

    /// Sum of all spawns.
    pub fn total_spawns(&self) -> u64 {
        self.spawns.iter().sum()
    }

    /// Counters accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &MigrationMap) -> MigrationMap {
        debug_assert_eq!(self.partitions, earlier.partitions);
        let sub = |a: &[u64], b: &[u64]| -> Vec<u64> {
            a.iter().zip(b).map(|(x, y)| x.saturating_sub(*y)).collect()
        };
        MigrationMap {
            partitions: self.partitions,
            migrations: sub(&self.migrations, &earlier.migrations),
            spawns: sub(&self.spawns, &earlier.spawns),
        }
    }
}

impl fmt::Display for MigrationMap {
    /// One line per source partition, comma-separated migration counts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.migrations.chunks(self.partitions.max(1)) {
            let line: Vec<String> = row.iter().map(u64::to_string).collect();
            writeln!(f, "{}", line.join(","))?;
        }
        Ok(())
    }
}
