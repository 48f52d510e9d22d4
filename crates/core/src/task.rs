// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task model and lifecycle.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a task.
    ///
    /// Each enqueued unit of work gets a unique ID used to track it through
    /// the queue, the worker pool, and the result log.
    pub struct TaskId("task-");
}

/// Maximum `depth` a task may have and still be scheduled.
///
/// Tasks scheduled by other tasks inherit `parent.depth + 1`; the ceiling
/// stops a loop of tasks spawning tasks from exhausting the pool.
pub const MAX_TASK_DEPTH: u32 = 3;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Direct request from the owner
    UserRequest,
    /// Code review of recent changes
    Review,
    /// Self-modification of the agent's own source
    Evolution,
    /// Background reflection round
    Consciousness,
    /// Scheduled by another task
    Scheduled,
}

impl TaskType {
    /// Default priority score for a freshly created task of this type.
    pub fn default_priority(self) -> i64 {
        match self {
            TaskType::UserRequest => 100,
            TaskType::Review => 50,
            TaskType::Evolution => 20,
            TaskType::Scheduled => 10,
            TaskType::Consciousness => 1,
        }
    }
}

crate::simple_display! {
    TaskType {
        UserRequest => "user_request",
        Review => "review",
        Evolution => "evolution",
        Consciousness => "consciousness",
        Scheduled => "scheduled",
    }
}

/// Terminal outcome of a task, written to the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Complete { result: String },
    Failed { reason: String },
    TimedOut,
    Cancelled,
}

crate::simple_display! {
    TaskOutcome {
        Complete { .. } => "complete",
        Failed { .. } => "failed",
        TimedOut => "timed_out",
        Cancelled => "cancelled",
    }
}

/// The unit of work scheduled by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Natural-language instruction for the agent loop
    pub instruction: String,
    /// Higher runs first; ties broken by oldest `created_at_ms`
    pub priority: i64,
    pub created_at_ms: u64,
    /// Cooperative interrupt deadline, seconds from assignment
    pub soft_timeout_secs: u64,
    /// Worker kill deadline, seconds from assignment
    pub hard_timeout_secs: u64,
    /// Task that scheduled this one, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    /// Scheduling-chain depth, bounded by [`MAX_TASK_DEPTH`]
    #[serde(default)]
    pub depth: u32,
    /// Chat that requested this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    /// Result slot, populated when the task completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Set when a worker picks the task up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
}

impl Task {
    /// Create a task with type-default priority and the given timeouts.
    pub fn new(
        task_type: TaskType,
        instruction: impl Into<String>,
        soft_timeout_secs: u64,
        hard_timeout_secs: u64,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            instruction: instruction.into(),
            priority: task_type.default_priority(),
            created_at_ms: clock.epoch_ms(),
            soft_timeout_secs,
            hard_timeout_secs,
            parent_id: None,
            depth: 0,
            chat_id: None,
            result: None,
            started_at_ms: None,
        }
    }

    crate::setters! {
        set {
            priority: i64,
            depth: u32,
        }
        option {
            parent_id: TaskId,
            chat_id: i64,
        }
    }

    /// True when the scheduling-chain depth disqualifies this task.
    pub fn over_depth_ceiling(&self) -> bool {
        self.depth > MAX_TASK_DEPTH
    }

    /// Seconds elapsed since the worker picked the task up, if running.
    pub fn running_secs(&self, now_ms: u64) -> Option<u64> {
        self.started_at_ms.map(|s| now_ms.saturating_sub(s) / 1000)
    }

    /// True once the soft timeout has elapsed.
    pub fn soft_timed_out(&self, now_ms: u64) -> bool {
        self.running_secs(now_ms).is_some_and(|s| s >= self.soft_timeout_secs)
    }

    /// True once the hard timeout has elapsed.
    pub fn hard_timed_out(&self, now_ms: u64) -> bool {
        self.running_secs(now_ms).is_some_and(|s| s >= self.hard_timeout_secs)
    }
}

/// Sort pending tasks: priority descending, then oldest first.
pub fn sort_pending(pending: &mut [Task]) {
    pending.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then(a.created_at_ms.cmp(&b.created_at_ms))
    });
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            instruction: String = "test task",
        }
        set {
            id: TaskId = TaskId::new(),
            task_type: TaskType = TaskType::UserRequest,
            priority: i64 = 100,
            created_at_ms: u64 = 1_000_000,
            soft_timeout_secs: u64 = 600,
            hard_timeout_secs: u64 = 1800,
            depth: u32 = 0,
        }
        option {
            parent_id: TaskId = None,
            chat_id: i64 = None,
            result: String = None,
            started_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
