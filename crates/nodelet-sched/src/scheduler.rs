//! The worker pool: start, hand out root contexts, stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nodelet_arena::Machine;
use nodelet_core::{NodeletError, NoopHooks, PartitionId, RegionHooks};

use crate::config::SchedConfig;
use crate::context::TaskContext;
use crate::migration::MigrationLog;
use crate::worker::{Message, Shared, WorkerHandle};

/// One worker thread per partition of a [`Machine`].
///
/// Dropping the scheduler stops every worker after it drains the tasks
/// already queued on it.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Vec<WorkerHandle>,
}

impl Scheduler {
    /// Start one worker per partition of `machine`, with no region hooks.
    pub fn new(machine: &Arc<Machine>, config: SchedConfig) -> Result<Self, NodeletError> {
        Self::with_hooks(machine, config, Arc::new(NoopHooks))
    }

    /// Start one worker per partition of `machine`, reporting regions to
    /// `hooks`.
    pub fn with_hooks(
        machine: &Arc<Machine>,
        config: SchedConfig,
        hooks: Arc<dyn RegionHooks>,
    ) -> Result<Self, NodeletError> {
        config.validate()?;
        let partitions = machine.partitions();
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions)
            .map(|_| crossbeam_channel::unbounded::<Message>())
            .unzip();
        let shared = Arc::new(Shared {
            machine: Arc::clone(machine),
            queues: senders.into_boxed_slice(),
            log: MigrationLog::new(partitions),
            hooks,
            stopped: AtomicBool::new(false),
        });

        let mut scheduler = Self {
            shared,
            workers: Vec::with_capacity(partitions),
        };
        for (p, rx) in receivers.into_iter().enumerate() {
            let partition = PartitionId(p as u32);
            // On failure, dropping `scheduler` stops the workers already started.
            let worker = WorkerHandle::spawn(&scheduler.shared, &config, partition, rx)?;
            scheduler.workers.push(worker);
        }
        tracing::info!(
            machine = %machine.id(),
            partitions,
            prefix = %config.thread_name_prefix,
            "scheduler started"
        );
        Ok(scheduler)
    }

    /// A fresh root task context resident on the home partition.
    ///
    /// The calling thread drives it directly; only its children run on
    /// worker threads.
    pub fn root(&self) -> TaskContext {
        TaskContext::new(Arc::clone(&self.shared), PartitionId::HOME, None)
    }

    /// The machine being scheduled.
    pub fn machine(&self) -> &Arc<Machine> {
        &self.shared.machine
    }

    /// Number of partitions (and worker threads).
    pub fn partitions(&self) -> usize {
        self.shared.queues.len()
    }

    /// Migration and spawn counters for every task run by this scheduler.
    pub fn migration_log(&self) -> &MigrationLog {
        &self.shared.log
    }

    /// Region hooks handed to every task context.
    pub fn hooks(&self) -> &dyn RegionHooks {
        &*self.shared.hooks
    }

    /// Stop every worker and wait for it to exit.
    pub fn shutdown(self) {
        drop(self);
    }

    fn stop_workers(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for worker in &self.workers {
            let _ = self.shared.queues[worker.partition.index()].send(Message::Stop);
        }
        for worker in &mut self.workers {
            worker.join();
        }
        tracing::info!(
            migrations = self.shared.log.total_migrations(),
            spawns = self.shared.log.total_spawns(),
            "scheduler stopped"
        );
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
