// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatcher: folds worker events into state, logs, and the bus.
//!
//! Runs single-threaded inside the supervisor tick; handlers stay
//! non-blocking (file appends and bounded state updates only). Anything
//! that needs the repo or the pool's async surface comes back as a
//! [`ControlAction`] for the supervisor to execute after the drain.

use crate::bus::MessageBus;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;
use ouro_core::{ChatRecord, Clock, Direction, Event, Settings, TaskId, TaskType};
use ouro_store::{JsonlLogs, LogKind, StateStore};

/// Deferred work the dispatcher hands back to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Restart { reason: String },
    Promote { task_id: TaskId },
}

/// Routes drained events by kind.
pub struct EventDispatcher {
    store: StateStore,
    logs: JsonlLogs,
    bus: MessageBus,
    settings: Settings,
}

impl EventDispatcher {
    pub fn new(store: StateStore, logs: JsonlLogs, bus: MessageBus, settings: Settings) -> Self {
        Self { store, logs, bus, settings }
    }

    pub fn owner_chat_id(&self) -> i64 {
        self.store.load().owner_chat_id.unwrap_or(1)
    }

    /// Fold one event. Returns deferred actions (usually none).
    pub fn dispatch<C: Clock>(
        &self,
        event: Event,
        queue: &mut TaskQueue<C>,
        pool: &mut WorkerPool,
    ) -> Vec<ControlAction> {
        match &event {
            Event::LlmUsage { model, usage, .. } => {
                match self.store.update_budget(model, usage) {
                    Ok(delta) if delta.crossed_limit => {
                        self.send_with_budget(
                            self.owner_chat_id(),
                            &format!(
                                "⚠️ Budget limit exceeded: ${:.2} of ${:.2} spent. \
                                 New LLM work will be refused.",
                                delta.spent_usd,
                                self.store.budget_limit_usd()
                            ),
                            false,
                            true,
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "budget update failed"),
                }
                self.append(LogKind::Events, &event);
            }

            Event::ToolCall { .. } => {
                self.append(LogKind::Tools, &event);
            }

            Event::Progress { text, .. } => {
                self.append(LogKind::Progress, &event);
                self.bus.send(self.owner_chat_id(), &format!("📝 {text}"), false);
            }

            Event::ChatOut { chat_id, text, markdown, .. } => {
                self.log_chat(Direction::Out, *chat_id, text);
                self.send_with_budget_fmt(*chat_id, text, *markdown, false);
            }

            Event::TaskComplete { task_id, .. } => {
                let finished = queue.finish(task_id);
                pool.mark_idle_by_task(task_id);
                self.append(LogKind::Events, &event);
                // A finished evolution cycle gets its changes reviewed
                if finished.is_some_and(|r| r.task.task_type == TaskType::Evolution) {
                    let _ = queue.queue_review_task("evolution_complete", false, &self.settings);
                }
            }

            Event::TaskFailed { task_id, reason, .. } => {
                queue.finish(task_id);
                pool.mark_idle_by_task(task_id);
                self.append(LogKind::Events, &event);
                self.send_with_budget(
                    self.owner_chat_id(),
                    &format!("⚠️ Task {} failed: {reason}", task_id.short(12)),
                    false,
                    false,
                );
            }

            Event::TaskCancelled { task_id, .. } => {
                queue.finish(task_id);
                pool.mark_idle_by_task(task_id);
                self.append(LogKind::Events, &event);
            }

            Event::TaskSchedule { task_id, instruction, depth, chat_id, .. } => {
                queue.enqueue_scheduled(
                    task_id,
                    instruction.clone(),
                    *depth,
                    *chat_id,
                    &self.settings,
                );
                self.append(LogKind::Events, &event);
            }

            Event::RestartRequest { task_id, reason, .. } => {
                self.append(LogKind::Events, &event);
                tracing::info!(task_id = %task_id, reason, "restart requested by agent");
                return vec![ControlAction::Restart { reason: reason.clone() }];
            }

            Event::PromoteRequest { task_id, .. } => {
                self.append(LogKind::Events, &event);
                return vec![ControlAction::Promote { task_id: task_id.clone() }];
            }

            Event::WorkerStarted { worker_id, .. } => {
                pool.record_heartbeat(worker_id);
                self.append(LogKind::Events, &event);
            }

            Event::Heartbeat { worker_id, .. } => {
                pool.record_heartbeat(worker_id);
            }

            Event::Log { .. } => {
                self.append(LogKind::Events, &event);
            }
        }
        Vec::new()
    }

    /// Owner-facing send with the periodic budget line attached every
    /// `budget_report_every` messages (or on `force`).
    pub fn send_with_budget(&self, chat_id: i64, text: &str, markdown: bool, force: bool) {
        self.log_chat(Direction::Out, chat_id, text);
        self.send_with_budget_fmt(chat_id, text, markdown, force);
    }

    fn send_with_budget_fmt(&self, chat_id: i64, text: &str, markdown: bool, force: bool) {
        let line = self.budget_line(force);
        let full = match line {
            Some(line) if text.trim().is_empty() => line,
            Some(line) => format!("{}\n\n{line}", text.trim_end()),
            None if text.trim().is_empty() => return,
            None => text.to_string(),
        };
        self.bus.send(chat_id, &full, markdown);
    }

    /// Record an inbound or outbound chat message in `chat.jsonl`.
    pub fn log_chat(&self, direction: Direction, chat_id: i64, text: &str) {
        let state = self.store.load();
        let record = ChatRecord::new(
            state.session_id.clone(),
            direction,
            chat_id,
            state.owner_id.unwrap_or(1),
            text,
        );
        match serde_json::to_value(&record) {
            Ok(value) => self.append_value(LogKind::Chat, &value),
            Err(e) => tracing::error!(error = %e, "unserializable chat record"),
        }
    }

    fn budget_line(&self, force: bool) -> Option<String> {
        let every = self.settings.budget_report_every.max(1);
        let due = self
            .store
            .update(|state| {
                if force {
                    state.budget_messages_since_report = 0;
                    return true;
                }
                state.budget_messages_since_report += 1;
                if state.budget_messages_since_report >= every {
                    state.budget_messages_since_report = 0;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if !due {
            return None;
        }

        let state = self.store.load();
        let limit = self.store.budget_limit_usd();
        let pct = if limit > 0.0 { state.spent_usd / limit * 100.0 } else { 0.0 };
        let sha = ouro_core::id::short(&state.current_sha, 8);
        Some(format!(
            "—\nBudget: ${:.4} / ${:.2} ({:.2}%) | {}@{}",
            state.spent_usd, limit, pct, state.current_branch, sha
        ))
    }

    fn append(&self, kind: LogKind, event: &Event) {
        match serde_json::to_value(event) {
            Ok(value) => self.append_value(kind, &value),
            Err(e) => tracing::error!(error = %e, "unserializable event"),
        }
    }

    fn append_value(&self, kind: LogKind, value: &serde_json::Value) {
        if let Err(e) = self.logs.append(kind, value) {
            tracing::error!(kind = %kind, error = %e, "log append failed");
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
