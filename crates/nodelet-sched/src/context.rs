//! Per-task execution state: residency, migration hints, and children.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Select};
use nodelet_arena::Machine;
use nodelet_core::{Location, MachineId, NodeletError, PartitionId, RegionHooks, Resident};
use smallvec::SmallVec;

use crate::migration::MigrationLog;
use crate::worker::{self, Inbox, Job, Message, Outcome, Shared};

/// A spawned child that has not been joined yet.
struct Child {
    partition: PartitionId,
    reply: Receiver<Outcome>,
}

/// The execution state of one task.
///
/// A context is resident on exactly one partition at a time. Touching a
/// location elsewhere relocates it (one migration). [`hint`](Self::hint)
/// followed by [`spawn`](Self::spawn) starts the child directly on the
/// hinted partition, so the child never has to migrate there.
pub struct TaskContext {
    shared: Arc<Shared>,
    partition: PartitionId,
    hint: Option<PartitionId>,
    children: SmallVec<[Child; 8]>,
    /// The queue of the worker running this task, if any. Drained while
    /// joining so a worker blocked in `join` keeps serving its partition.
    inbox: Option<Inbox>,
}

impl TaskContext {
    pub(crate) fn new(shared: Arc<Shared>, partition: PartitionId, inbox: Option<Inbox>) -> Self {
        Self {
            shared,
            partition,
            hint: None,
            children: SmallVec::new(),
            inbox,
        }
    }

    /// The machine this task's scheduler runs on.
    pub fn machine(&self) -> &Arc<Machine> {
        &self.shared.machine
    }

    /// Number of partitions.
    pub fn partitions(&self) -> usize {
        self.shared.queues.len()
    }

    /// The shared migration counters.
    pub fn migration_log(&self) -> &MigrationLog {
        &self.shared.log
    }

    /// Region hooks configured on the scheduler.
    ///
    /// Returned by handle so a region can stay open across `spawn`/`join`.
    pub fn hooks(&self) -> Arc<dyn RegionHooks> {
        Arc::clone(&self.shared.hooks)
    }

    /// Prefer the partition owning `location` for the next spawn.
    ///
    /// The hint is consumed by the next [`spawn`](Self::spawn) and replaces
    /// any earlier unconsumed hint. An out-of-range partition is ignored.
    pub fn hint(&mut self, location: Location) {
        if location.partition.index() < self.partitions() {
            self.hint = Some(location.partition);
        } else {
            tracing::warn!(%location, "ignoring hint outside the machine");
        }
    }

    /// The hint the next spawn will consume, if any.
    pub fn pending_hint(&self) -> Option<PartitionId> {
        self.hint
    }

    /// Start `task` as a child of this task.
    ///
    /// The child runs on the hinted partition, or on this task's current
    /// partition when no hint is pending. Its outcome is collected by the
    /// next [`join`](Self::join).
    pub fn spawn<F>(&mut self, task: F) -> Result<(), NodeletError>
    where
        F: FnOnce(&mut TaskContext) -> Result<(), NodeletError> + Send + 'static,
    {
        if self.shared.is_stopped() {
            return Err(NodeletError::SchedulerStopped);
        }
        let target = self.hint.take().unwrap_or(self.partition);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let job = Job {
            task: Box::new(task),
            reply: tx,
        };
        self.shared.queues[target.index()]
            .send(Message::Run(job))
            .map_err(|_| NodeletError::SchedulerStopped)?;
        self.shared.log.record_spawn(self.partition, target);
        tracing::trace!(from = %self.partition, to = %target, "spawn");
        self.children.push(Child {
            partition: target,
            reply: rx,
        });
        Ok(())
    }

    /// Children spawned since the last join.
    pub fn outstanding(&self) -> usize {
        self.children.len()
    }

    /// Wait for every child spawned since the last join.
    ///
    /// Returns the first failure in spawn order. Every child is waited for
    /// even when an earlier one failed. A child that finished on a different
    /// partition returns to this task's partition, which is counted as one
    /// migration.
    pub fn join(&mut self) -> Result<(), NodeletError> {
        if self.children.is_empty() {
            return Ok(());
        }
        let children = std::mem::take(&mut self.children);
        let outcomes = self.wait_all(&children);

        let mut first_error = None;
        let mut failures = 0usize;
        for outcome in outcomes {
            if outcome.final_partition != self.partition {
                self.shared
                    .log
                    .record_migration(outcome.final_partition, self.partition);
            }
            if let Err(e) = outcome.result {
                failures += 1;
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => {
                tracing::debug!(
                    partition = %self.partition,
                    failures,
                    error = %e,
                    "join saw failed children"
                );
                Err(e)
            }
        }
    }

    /// Collect one outcome per child, in spawn order.
    ///
    /// While waiting, jobs queued on this task's own worker are run inline.
    fn wait_all(&self, children: &[Child]) -> Vec<Outcome> {
        let mut outcomes: Vec<Option<Outcome>> = children.iter().map(|_| None).collect();
        let mut remaining = children.len();
        let mut stop_seen = false;

        while remaining > 0 {
            let mut select = Select::new();
            let mut waiting = Vec::with_capacity(remaining);
            for (i, child) in children.iter().enumerate() {
                if outcomes[i].is_none() {
                    select.recv(&child.reply);
                    waiting.push(i);
                }
            }
            let inbox_op = match (&self.inbox, stop_seen) {
                (Some(inbox), false) => Some(select.recv(&inbox.rx)),
                _ => None,
            };

            let op = select.select();
            let index = op.index();
            if let (Some(inbox), Some(inbox_index)) = (&self.inbox, inbox_op) {
                if index == inbox_index {
                    match op.recv(&inbox.rx) {
                        Ok(Message::Run(job)) => worker::execute(&self.shared, inbox, job),
                        // Leave the stop for the worker loop once this task finishes.
                        Ok(Message::Stop) | Err(_) => stop_seen = true,
                    }
                    continue;
                }
            }

            let child_index = waiting[index];
            let child = &children[child_index];
            let outcome = op.recv(&child.reply).unwrap_or_else(|_| Outcome {
                result: Err(NodeletError::TaskPanicked {
                    partition: child.partition,
                }),
                final_partition: child.partition,
            });
            outcomes[child_index] = Some(outcome);
            remaining -= 1;
        }

        if stop_seen {
            if let Some(inbox) = &self.inbox {
                let _ = self.shared.queues[inbox.home.index()].send(Message::Stop);
            }
        }
        outcomes.into_iter().flatten().collect()
    }
}

impl Resident for TaskContext {
    fn partition(&self) -> PartitionId {
        self.partition
    }

    fn machine_id(&self) -> Option<MachineId> {
        Some(self.shared.machine.id())
    }

    fn relocate_to(&mut self, partition: PartitionId) {
        if partition.index() >= self.partitions() {
            tracing::error!(%partition, "relocation outside the machine");
            debug_assert!(false, "relocation to {partition} outside the machine");
            return;
        }
        if partition == self.partition {
            return;
        }
        self.shared.log.record_migration(self.partition, partition);
        tracing::trace!(from = %self.partition, to = %partition, "migrate");
        self.partition = partition;
    }
}

impl Drop for TaskContext {
    fn drop(&mut self) {
        if !self.children.is_empty() {
            if let Err(e) = self.join() {
                tracing::warn!(error = %e, "unjoined child failed");
            }
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("partition", &self.partition)
            .field("hint", &self.hint)
            .field("outstanding", &self.children.len())
            .finish_non_exhaustive()
    }
}
