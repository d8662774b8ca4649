//! Partition workers: one OS thread per partition, fed over a channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use nodelet_arena::Machine;
use nodelet_core::{NodeletError, PartitionId, RegionHooks, Resident};

use crate::config::SchedConfig;
use crate::context::TaskContext;
use crate::migration::MigrationLog;

/// A spawned task body.
pub(crate) type Task = Box<dyn FnOnce(&mut TaskContext) -> Result<(), NodeletError> + Send>;

/// A task plus the channel its outcome is reported on.
pub(crate) struct Job {
    pub(crate) task: Task,
    pub(crate) reply: Sender<Outcome>,
}

/// What a partition worker's queue carries.
pub(crate) enum Message {
    Run(Job),
    Stop,
}

/// Result of one finished task, reported to its parent.
pub(crate) struct Outcome {
    pub(crate) result: Result<(), NodeletError>,
    /// Where the task was resident when it finished.
    pub(crate) final_partition: PartitionId,
}

/// State shared by the scheduler, its workers, and every task context.
pub(crate) struct Shared {
    pub(crate) machine: Arc<Machine>,
    pub(crate) queues: Box<[Sender<Message>]>,
    pub(crate) log: MigrationLog,
    pub(crate) hooks: Arc<dyn RegionHooks>,
    pub(crate) stopped: AtomicBool,
}

impl Shared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A worker's own queue, drained by tasks that block in `join` on it.
#[derive(Clone)]
pub(crate) struct Inbox {
    pub(crate) home: PartitionId,
    pub(crate) rx: Receiver<Message>,
}

/// Handle to a running partition worker.
pub(crate) struct WorkerHandle {
    pub(crate) partition: PartitionId,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start the worker for `partition`.
    pub(crate) fn spawn(
        shared: &Arc<Shared>,
        config: &SchedConfig,
        partition: PartitionId,
        rx: Receiver<Message>,
    ) -> Result<Self, NodeletError> {
        let mut builder = thread::Builder::new().name(config.thread_name(partition.index()));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let shared = Arc::clone(shared);
        let inbox = Inbox { home: partition, rx };
        let thread = builder
            .spawn(move || worker_main(shared, inbox))
            .map_err(|e| NodeletError::ThreadSpawnFailed {
                partition,
                reason: e.to_string(),
            })?;
        Ok(Self {
            partition,
            thread: Some(thread),
        })
    }

    /// Wait for the worker thread to exit. The stop message must already
    /// have been sent.
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(partition = %self.partition, "worker thread panicked");
            }
        }
    }
}

fn worker_main(shared: Arc<Shared>, inbox: Inbox) {
    tracing::debug!(partition = %inbox.home, "worker started");
    let mut executed: u64 = 0;
    while let Ok(message) = inbox.rx.recv() {
        match message {
            Message::Run(job) => {
                execute(&shared, &inbox, job);
                executed += 1;
            }
            Message::Stop => break,
        }
    }
    tracing::debug!(partition = %inbox.home, executed, "worker stopped");
}

/// Run `job` on `inbox.home` and report its outcome.
///
/// Children the task left unjoined are joined implicitly before the outcome
/// is sent. A panic in the task is reported as `TaskPanicked`.
pub(crate) fn execute(shared: &Arc<Shared>, inbox: &Inbox, job: Job) {
    let Job { task, reply } = job;
    let mut ctx = TaskContext::new(Arc::clone(shared), inbox.home, Some(inbox.clone()));
    let result = match catch_unwind(AssertUnwindSafe(|| task(&mut ctx))) {
        Ok(result) => {
            let joined = ctx.join();
            result.and(joined)
        }
        Err(_) => {
            tracing::warn!(partition = %inbox.home, "task panicked");
            // Still wait for its children so none outlives the report.
            let _ = ctx.join();
            Err(NodeletError::TaskPanicked {
                partition: inbox.home,
            })
        }
    };
    let outcome = Outcome {
        result,
        final_partition: ctx.partition(),
    };
    // The parent may have given up on this reply; nothing to do then.
    let _ = reply.send(outcome);
}
