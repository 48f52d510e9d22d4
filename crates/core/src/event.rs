// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events produced by workers and the resident chat agent.
//!
//! Serializes with `{"type": "scope:name", ...fields}` format. Every variant
//! carries the originating task id where one exists and a UTC ISO timestamp.

use crate::clock::utc_iso_now;
use crate::task::TaskId;
use crate::usage::Usage;
use crate::WorkerId;
use serde::{Deserialize, Serialize};

/// Safety-gate outcome recorded alongside each tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Tool is not in the checked set
    Unchecked,
    Allowed,
    /// Allowed with a safety warning surfaced to the model
    Warned,
    Blocked,
}

crate::simple_display! {
    GateDecision {
        Unchecked => "unchecked",
        Allowed => "allowed",
        Warned => "warned",
        Blocked => "blocked",
    }
}

/// Events flowing from agent loops to the supervisor's dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// One LLM turn's token usage
    #[serde(rename = "llm:usage")]
    LlmUsage { task_id: TaskId, model: String, usage: Usage, ts: String },

    /// A tool call executed (or blocked), with the gate decision taken
    #[serde(rename = "tool:call")]
    ToolCall {
        task_id: TaskId,
        tool: String,
        args: serde_json::Value,
        gate: GateDecision,
        result_chars: usize,
        ts: String,
    },

    /// Concise progress note for the owner
    #[serde(rename = "task:progress")]
    Progress { task_id: TaskId, text: String, ts: String },

    /// Final assistant text for a chat
    #[serde(rename = "chat:out")]
    ChatOut {
        task_id: TaskId,
        chat_id: i64,
        text: String,
        #[serde(default)]
        markdown: bool,
        ts: String,
    },

    #[serde(rename = "task:complete")]
    TaskComplete { task_id: TaskId, result: String, ts: String },

    #[serde(rename = "task:failed")]
    TaskFailed { task_id: TaskId, reason: String, ts: String },

    #[serde(rename = "task:cancelled")]
    TaskCancelled { task_id: TaskId, ts: String },

    /// Agent asks the host to restart the supervisor process
    #[serde(rename = "restart:request")]
    RestartRequest { task_id: TaskId, reason: String, ts: String },

    /// A task asks the supervisor to enqueue a child task
    #[serde(rename = "task:schedule")]
    TaskSchedule {
        task_id: TaskId,
        instruction: String,
        /// Child depth (parent depth + 1); the queue enforces the ceiling
        depth: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<i64>,
        ts: String,
    },

    /// A task asks the supervisor to fast-forward stable to dev
    #[serde(rename = "repo:promote")]
    PromoteRequest { task_id: TaskId, ts: String },

    #[serde(rename = "worker:started")]
    WorkerStarted { worker_id: WorkerId, ts: String },

    #[serde(rename = "worker:heartbeat")]
    Heartbeat { worker_id: WorkerId, ts: String },

    /// Freeform log line from a worker
    #[serde(rename = "log")]
    Log { line: String, ts: String },
}

impl Event {
    pub fn llm_usage(task_id: TaskId, model: impl Into<String>, usage: Usage) -> Self {
        Event::LlmUsage { task_id, model: model.into(), usage, ts: utc_iso_now() }
    }

    pub fn tool_call(
        task_id: TaskId,
        tool: impl Into<String>,
        args: serde_json::Value,
        gate: GateDecision,
        result_chars: usize,
    ) -> Self {
        Event::ToolCall { task_id, tool: tool.into(), args, gate, result_chars, ts: utc_iso_now() }
    }

    pub fn progress(task_id: TaskId, text: impl Into<String>) -> Self {
        Event::Progress { task_id, text: text.into(), ts: utc_iso_now() }
    }

    pub fn chat_out(task_id: TaskId, chat_id: i64, text: impl Into<String>, markdown: bool) -> Self {
        Event::ChatOut { task_id, chat_id, text: text.into(), markdown, ts: utc_iso_now() }
    }

    pub fn task_complete(task_id: TaskId, result: impl Into<String>) -> Self {
        Event::TaskComplete { task_id, result: result.into(), ts: utc_iso_now() }
    }

    pub fn task_failed(task_id: TaskId, reason: impl Into<String>) -> Self {
        Event::TaskFailed { task_id, reason: reason.into(), ts: utc_iso_now() }
    }

    pub fn task_cancelled(task_id: TaskId) -> Self {
        Event::TaskCancelled { task_id, ts: utc_iso_now() }
    }

    pub fn restart_request(task_id: TaskId, reason: impl Into<String>) -> Self {
        Event::RestartRequest { task_id, reason: reason.into(), ts: utc_iso_now() }
    }

    pub fn task_schedule(
        task_id: TaskId,
        instruction: impl Into<String>,
        depth: u32,
        chat_id: Option<i64>,
    ) -> Self {
        Event::TaskSchedule {
            task_id,
            instruction: instruction.into(),
            depth,
            chat_id,
            ts: utc_iso_now(),
        }
    }

    pub fn promote_request(task_id: TaskId) -> Self {
        Event::PromoteRequest { task_id, ts: utc_iso_now() }
    }

    pub fn worker_started(worker_id: WorkerId) -> Self {
        Event::WorkerStarted { worker_id, ts: utc_iso_now() }
    }

    pub fn heartbeat(worker_id: WorkerId) -> Self {
        Event::Heartbeat { worker_id, ts: utc_iso_now() }
    }

    pub fn log(line: impl Into<String>) -> Self {
        Event::Log { line: line.into(), ts: utc_iso_now() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::LlmUsage { .. } => "llm:usage",
            Event::ToolCall { .. } => "tool:call",
            Event::Progress { .. } => "task:progress",
            Event::ChatOut { .. } => "chat:out",
            Event::TaskComplete { .. } => "task:complete",
            Event::TaskFailed { .. } => "task:failed",
            Event::TaskCancelled { .. } => "task:cancelled",
            Event::RestartRequest { .. } => "restart:request",
            Event::TaskSchedule { .. } => "task:schedule",
            Event::PromoteRequest { .. } => "repo:promote",
            Event::WorkerStarted { .. } => "worker:started",
            Event::Heartbeat { .. } => "worker:heartbeat",
            Event::Log { .. } => "log",
        }
    }

    /// The originating task, where one exists.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::LlmUsage { task_id, .. }
            | Event::ToolCall { task_id, .. }
            | Event::Progress { task_id, .. }
            | Event::ChatOut { task_id, .. }
            | Event::TaskComplete { task_id, .. }
            | Event::TaskFailed { task_id, .. }
            | Event::TaskCancelled { task_id, .. }
            | Event::RestartRequest { task_id, .. }
            | Event::TaskSchedule { task_id, .. }
            | Event::PromoteRequest { task_id, .. } => Some(task_id),
            Event::WorkerStarted { .. } | Event::Heartbeat { .. } | Event::Log { .. } => None,
        }
    }

    pub fn ts(&self) -> &str {
        match self {
            Event::LlmUsage { ts, .. }
            | Event::ToolCall { ts, .. }
            | Event::Progress { ts, .. }
            | Event::ChatOut { ts, .. }
            | Event::TaskComplete { ts, .. }
            | Event::TaskFailed { ts, .. }
            | Event::TaskCancelled { ts, .. }
            | Event::RestartRequest { ts, .. }
            | Event::TaskSchedule { ts, .. }
            | Event::PromoteRequest { ts, .. }
            | Event::WorkerStarted { ts, .. }
            | Event::Heartbeat { ts, .. }
            | Event::Log { ts, .. } => ts,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
