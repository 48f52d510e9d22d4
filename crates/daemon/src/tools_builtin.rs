// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor-contract tools available to every task.
//!
//! These are the tools that talk back to the control plane; they emit events
//! and return immediately. Heavyweight tools (shell, browser, file I/O) are
//! registered by the embedder on top of this set.

use ouro_agent::{ToolEntry, ToolRegistry};
use ouro_core::{Event, Task, TaskId};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Build the per-task registry of built-in control tools.
pub fn build_registry(events: mpsc::UnboundedSender<Event>, task: &Task) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let task_id = task.id.clone();
    let chat_id = task.chat_id;
    let depth = task.depth;

    registry.register(send_owner_message(events.clone(), task_id.clone(), chat_id));
    registry.register(report_progress(events.clone(), task_id.clone()));
    registry.register(schedule_task(events.clone(), task_id.clone(), depth, chat_id));
    registry.register(request_restart(events.clone(), task_id.clone()));
    registry.register(promote_to_stable(events, task_id));
    registry
}

fn text_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn send_owner_message(
    events: mpsc::UnboundedSender<Event>,
    task_id: TaskId,
    chat_id: Option<i64>,
) -> ToolEntry {
    ToolEntry::new(
        "send_owner_message",
        "Send a message to the owner's chat immediately, without ending the task.",
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }),
        move |_ctx, args| {
            let text = text_arg(&args, "text").unwrap_or_default();
            let _ = events.send(Event::chat_out(
                task_id.clone(),
                chat_id.unwrap_or(1),
                text,
                false,
            ));
            Ok("Message sent.".to_string())
        },
    )
}

fn report_progress(events: mpsc::UnboundedSender<Event>, task_id: TaskId) -> ToolEntry {
    ToolEntry::new(
        "report_progress",
        "Report a one-line progress note. Shown to the owner and logged.",
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        }),
        move |_ctx, args| {
            let text = text_arg(&args, "text").unwrap_or_default();
            let _ = events.send(Event::progress(task_id.clone(), text));
            Ok("Noted.".to_string())
        },
    )
}

fn schedule_task(
    events: mpsc::UnboundedSender<Event>,
    task_id: TaskId,
    depth: u32,
    chat_id: Option<i64>,
) -> ToolEntry {
    ToolEntry::new(
        "schedule_task",
        "Enqueue a background task to run on the worker pool. Returns immediately.",
        json!({
            "type": "object",
            "properties": { "instruction": { "type": "string" } },
            "required": ["instruction"]
        }),
        move |_ctx, args| {
            let instruction = text_arg(&args, "instruction").unwrap_or_default();
            if instruction.is_empty() {
                return Ok("⚠️ schedule_task requires an instruction.".to_string());
            }
            let _ = events.send(Event::task_schedule(
                task_id.clone(),
                instruction,
                depth + 1,
                chat_id,
            ));
            Ok("Task queued.".to_string())
        },
    )
}

fn request_restart(events: mpsc::UnboundedSender<Event>, task_id: TaskId) -> ToolEntry {
    ToolEntry::new(
        "request_restart",
        "Request a supervisor restart to load your latest committed code. \
         Uncommitted work is rescued first.",
        json!({
            "type": "object",
            "properties": { "reason": { "type": "string" } }
        }),
        move |_ctx, args| {
            let reason =
                text_arg(&args, "reason").unwrap_or_else(|| "agent request".to_string());
            let _ = events.send(Event::restart_request(task_id.clone(), reason));
            Ok("Restart requested. The supervisor will restart shortly.".to_string())
        },
    )
}

fn promote_to_stable(events: mpsc::UnboundedSender<Event>, task_id: TaskId) -> ToolEntry {
    ToolEntry::new(
        "promote_to_stable",
        "Fast-forward the stable branch to the current dev branch.",
        json!({ "type": "object", "properties": {} }),
        move |_ctx, _args| {
            let _ = events.send(Event::promote_request(task_id.clone()));
            Ok("Promotion requested.".to_string())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_the_control_tool_set() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let registry = build_registry(tx, &Task::builder().build());
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "promote_to_stable",
                "report_progress",
                "request_restart",
                "schedule_task",
                "send_owner_message"
            ]
        );
    }

    #[test]
    fn schedule_task_emits_child_with_incremented_depth() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = Task::builder().depth(1).chat_id(7i64).build();
        let registry = build_registry(tx, &task);

        let ctx = ouro_agent::ToolCtx {
            repo_dir: "/tmp".into(),
            data_dir: "/tmp".into(),
            task_id: task.id.clone(),
            task_depth: task.depth,
            chat_id: task.chat_id,
        };
        registry.execute("schedule_task", &ctx, json!({"instruction": "clean up"})).unwrap();

        match rx.try_recv().unwrap() {
            Event::TaskSchedule { depth, chat_id, instruction, .. } => {
                assert_eq!(depth, 2);
                assert_eq!(chat_id, Some(7));
                assert_eq!(instruction, "clean up");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn send_owner_message_defaults_to_owner_chat() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = Task::builder().build(); // no chat id
        let registry = build_registry(tx, &task);
        let ctx = ouro_agent::ToolCtx {
            repo_dir: "/tmp".into(),
            data_dir: "/tmp".into(),
            task_id: task.id.clone(),
            task_depth: 0,
            chat_id: None,
        };
        registry.execute("send_owner_message", &ctx, json!({"text": "hi"})).unwrap();

        match rx.try_recv().unwrap() {
            Event::ChatOut { chat_id, text, .. } => {
                assert_eq!(chat_id, 1);
                assert_eq!(text, "hi");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
