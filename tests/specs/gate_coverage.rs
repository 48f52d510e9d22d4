// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Every call to a checked tool must leave a gate decision in
//! `tools.jsonl`, wired end to end: agent loop → event channel →
//! dispatcher → log.

use ouro_agent::{
    AgentLoop, AgentLoopConfig, FakeLlm, SafetyGate, ToolCtx, ToolEntry, ToolRegistry,
};
use ouro_core::{FakeClock, PriceTable, Settings, TaskId};
use ouro_daemon::bus::MessageBus;
use ouro_daemon::dispatch::EventDispatcher;
use ouro_daemon::pool::{PoolConfig, WorkerPool};
use ouro_daemon::TaskQueue;
use ouro_store::{JsonlLogs, LogKind, QueueSnapshot, StateStore};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::test]
async fn checked_tool_calls_leave_gate_decisions_in_tools_log() {
    let dir = tempfile::tempdir().unwrap();
    let llm = FakeLlm::new();

    // Turn 1: a checked tool (gated SAFE), turn 2: an unchecked tool,
    // turn 3: done
    llm.reply_tool_call("run_shell", json!({"cmd": "ls"}));
    llm.reply_text(r#"{"status": "SAFE", "reason": "listing"}"#);
    llm.reply_tool_call("echo", json!({"text": "x"}));
    llm.reply_text("finished");

    let mut registry = ToolRegistry::new();
    registry.register(ToolEntry::new("run_shell", "shell", json!({"type": "object"}), |_, _| {
        Ok("ran".to_string())
    }));
    registry.register(ToolEntry::new("echo", "echo", json!({"type": "object"}), |_, _| {
        Ok("echoed".to_string())
    }));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (_inject_tx, inject_rx) = mpsc::unbounded_channel();
    let agent_loop = AgentLoop {
        task_id: TaskId::from_string("task-1"),
        chat_id: None,
        instruction: "list files".to_string(),
        system_prompt: "test".to_string(),
        llm: Arc::new(llm.clone()),
        registry: Arc::new(registry),
        gate: SafetyGate::new(Arc::new(llm.clone()), "light", "heavy"),
        ctx: ToolCtx {
            repo_dir: PathBuf::from("/tmp"),
            data_dir: dir.path().to_path_buf(),
            task_id: TaskId::from_string("task-1"),
            task_depth: 0,
            chat_id: None,
        },
        events: event_tx.clone(),
        interrupt: Arc::new(AtomicBool::new(false)),
        inject_rx,
        budget_exhausted: Arc::new(|| false),
        config: AgentLoopConfig::default(),
    };
    agent_loop.run().await;
    drop(event_tx);

    // Feed the emitted events through the dispatcher, as the supervisor
    // tick would
    let store = StateStore::new(dir.path(), PriceTable::empty(), 0.0);
    let logs = JsonlLogs::new(dir.path());
    let dispatcher =
        EventDispatcher::new(store, logs.clone(), MessageBus::new(), Settings::default());
    let mut queue = TaskQueue::new(QueueSnapshot::new(dir.path()), FakeClock::new());
    let (pool_tx, _pool_rx) = mpsc::unbounded_channel();
    let mut pool = WorkerPool::new(
        PoolConfig {
            max_workers: 1,
            data_dir: dir.path().to_path_buf(),
            repo_dir: PathBuf::from("/tmp"),
            worker_program: PathBuf::from("/nonexistent"),
        },
        pool_tx,
    );
    while let Some(event) = event_rx.recv().await {
        dispatcher.dispatch(event, &mut queue, &mut pool);
    }

    let content = std::fs::read_to_string(logs.path(LogKind::Tools)).unwrap();
    let records: Vec<serde_json::Value> =
        content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 2);

    let shell = records.iter().find(|r| r["tool"] == "run_shell").unwrap();
    assert_eq!(shell["gate"], "allowed");
    let echo = records.iter().find(|r| r["tool"] == "echo").unwrap();
    assert_eq!(echo["gate"], "unchecked");
}
