// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending/running task lists with priority, durable snapshots, and timeout
//! enforcement.

use ouro_core::{
    task::sort_pending, Clock, Settings, State, Task, TaskId, TaskType, WorkerId,
};
use ouro_store::QueueSnapshot;
use std::collections::HashMap;

/// A task currently assigned to a worker.
#[derive(Debug, Clone)]
pub struct RunningTask {
    pub task: Task,
    pub worker_id: WorkerId,
    /// Soft-timeout warning already emitted
    pub soft_warned: bool,
    /// Cooperative interrupt requested (cancel or soft timeout)
    pub interrupt_requested: bool,
}

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    RemovedFromPending,
    /// Running; the worker must be signalled to interrupt
    FlagRunning(WorkerId),
    NotFound,
}

/// Timeout enforcement actions for the supervisor to carry out.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TimeoutActions {
    /// Emit a warning and signal cooperative interrupt
    pub soft: Vec<(TaskId, WorkerId)>,
    /// Kill the worker
    pub hard: Vec<(TaskId, WorkerId)>,
}

/// The supervisor's in-memory queue, snapshotted to disk every tick.
pub struct TaskQueue<C: Clock> {
    pending: Vec<Task>,
    running: HashMap<TaskId, RunningTask>,
    snapshot: QueueSnapshot,
    clock: C,
}

impl<C: Clock> TaskQueue<C> {
    pub fn new(snapshot: QueueSnapshot, clock: C) -> Self {
        Self { pending: Vec::new(), running: HashMap::new(), snapshot, clock }
    }

    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn running(&self) -> impl Iterator<Item = &RunningTask> {
        self.running.values()
    }

    pub fn get_running(&self, id: &TaskId) -> Option<&RunningTask> {
        self.running.get(id)
    }

    /// Add a task. Idempotent by id; pending stays priority-sorted.
    pub fn enqueue(&mut self, task: Task) -> bool {
        if self.running.contains_key(&task.id) || self.pending.iter().any(|t| t.id == task.id) {
            return false;
        }
        tracing::info!(task_id = %task.id, task_type = %task.task_type, priority = task.priority, "task enqueued");
        self.pending.push(task);
        sort_pending(&mut self.pending);
        self.persist();
        true
    }

    /// Remove from pending, or flag the running record for interruption.
    pub fn cancel(&mut self, id: &TaskId) -> CancelOutcome {
        if let Some(pos) = self.pending.iter().position(|t| t.id == *id) {
            self.pending.remove(pos);
            self.persist();
            return CancelOutcome::RemovedFromPending;
        }
        match self.running.get_mut(id) {
            Some(record) => {
                record.interrupt_requested = true;
                CancelOutcome::FlagRunning(record.worker_id.clone())
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Pop up to `n` assignable tasks in priority order. Tasks over the
    /// depth ceiling are dropped, returned separately for event emission.
    pub fn take_assignable(&mut self, n: usize) -> (Vec<Task>, Vec<Task>) {
        let mut taken = Vec::new();
        let mut dropped = Vec::new();
        while taken.len() < n && !self.pending.is_empty() {
            let task = self.pending.remove(0);
            if task.over_depth_ceiling() {
                tracing::warn!(task_id = %task.id, depth = task.depth, "dropping task over depth ceiling");
                dropped.push(task);
            } else {
                taken.push(task);
            }
        }
        if !taken.is_empty() || !dropped.is_empty() {
            self.persist();
        }
        (taken, dropped)
    }

    /// Record a task as running on a worker; stamps `started_at`.
    pub fn mark_running(&mut self, mut task: Task, worker_id: WorkerId) {
        task.started_at_ms = Some(self.clock.epoch_ms());
        self.running.insert(
            task.id.clone(),
            RunningTask { task, worker_id, soft_warned: false, interrupt_requested: false },
        );
    }

    /// Evict a finished task from the running set.
    pub fn finish(&mut self, id: &TaskId) -> Option<RunningTask> {
        self.running.remove(id)
    }

    /// Evict whatever task a dead worker was running.
    pub fn finish_by_worker(&mut self, worker_id: &WorkerId) -> Option<RunningTask> {
        let id = self
            .running
            .values()
            .find(|r| r.worker_id == *worker_id)
            .map(|r| r.task.id.clone())?;
        self.running.remove(&id)
    }

    /// Compare running tasks against their deadlines.
    ///
    /// Soft actions fire once per task; hard actions repeat until the worker
    /// is gone (the kill path evicts the record).
    pub fn enforce_timeouts(&mut self) -> TimeoutActions {
        let now_ms = self.clock.epoch_ms();
        let mut actions = TimeoutActions::default();
        for record in self.running.values_mut() {
            if record.task.hard_timed_out(now_ms) {
                actions.hard.push((record.task.id.clone(), record.worker_id.clone()));
            } else if record.task.soft_timed_out(now_ms) && !record.soft_warned {
                record.soft_warned = true;
                record.interrupt_requested = true;
                actions.soft.push((record.task.id.clone(), record.worker_id.clone()));
            }
        }
        actions
    }

    /// Queue one evolution task when the mode is on and enough spend has
    /// accumulated since the last one. Deduplicated against pending and
    /// running evolution tasks.
    pub fn enqueue_evolution_task_if_needed(
        &mut self,
        state: &mut State,
        settings: &Settings,
    ) -> Option<TaskId> {
        if !state.evolution_mode_enabled {
            return None;
        }
        let spent_since = state.spent_usd - state.evo_cost_at_last_task;
        if spent_since < settings.evo_cost_threshold_usd {
            return None;
        }
        if self.has_task_of_type(TaskType::Evolution) {
            return None;
        }

        state.evo_cost_at_last_task = state.spent_usd;
        state.evolution_cycle += 1;
        let task = Task::new(
            TaskType::Evolution,
            format!(
                "Evolution cycle {}: review your recent activity and improve your own code.",
                state.evolution_cycle
            ),
            settings.soft_timeout_secs,
            settings.hard_timeout_secs,
            &self.clock,
        );
        let id = task.id.clone();
        self.enqueue(task);
        Some(id)
    }

    /// Queue a child task scheduled by a running task.
    pub fn enqueue_scheduled(
        &mut self,
        parent_id: &TaskId,
        instruction: String,
        depth: u32,
        chat_id: Option<i64>,
        settings: &Settings,
    ) -> TaskId {
        let task = Task::new(
            TaskType::Scheduled,
            instruction,
            settings.soft_timeout_secs,
            settings.hard_timeout_secs,
            &self.clock,
        )
        .depth(depth)
        .parent_id(parent_id.clone());
        let task = match chat_id {
            Some(id) => task.chat_id(id),
            None => task,
        };
        let id = task.id.clone();
        self.enqueue(task);
        id
    }

    /// Queue a code-review task; deduplicated unless forced.
    pub fn queue_review_task(
        &mut self,
        reason: &str,
        force: bool,
        settings: &Settings,
    ) -> Option<TaskId> {
        if !force && self.has_task_of_type(TaskType::Review) {
            return None;
        }
        let task = Task::new(
            TaskType::Review,
            format!("Review the latest changes to your codebase. Trigger: {reason}"),
            settings.soft_timeout_secs,
            settings.hard_timeout_secs,
            &self.clock,
        );
        let id = task.id.clone();
        self.enqueue(task);
        Some(id)
    }

    /// Drop queued evolution tasks (`/evolve off`).
    pub fn drop_evolution_tasks(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|t| t.task_type != TaskType::Evolution);
        let dropped = before - self.pending.len();
        if dropped > 0 {
            self.persist();
        }
        dropped
    }

    /// Move running tasks back to pending (restart recovery).
    pub fn requeue_running(&mut self) -> usize {
        let mut count = 0;
        for (_, mut record) in self.running.drain() {
            record.task.started_at_ms = None;
            self.pending.push(record.task);
            count += 1;
        }
        if count > 0 {
            sort_pending(&mut self.pending);
            self.persist();
        }
        count
    }

    fn has_task_of_type(&self, task_type: TaskType) -> bool {
        self.pending.iter().any(|t| t.task_type == task_type)
            || self.running.values().any(|r| r.task.task_type == task_type)
    }

    /// Serialise the pending list (not running) to the durable snapshot.
    pub fn persist(&self) {
        if let Err(e) = self.snapshot.persist(&self.pending) {
            tracing::error!(error = %e, "failed to persist queue snapshot");
        }
    }

    /// Rewrite pending from the snapshot at startup. Returns the count.
    pub fn restore(&mut self) -> usize {
        let mut restored = self.snapshot.restore();
        let count = restored.len();
        sort_pending(&mut restored);
        self.pending = restored;
        count
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
