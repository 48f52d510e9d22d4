// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::llm::fake::FakeLlm;
use crate::tools::ToolEntry;
use serde_json::json;
use std::path::PathBuf;

struct Harness {
    llm: FakeLlm,
    events: mpsc::UnboundedReceiver<Event>,
    interrupt: Arc<AtomicBool>,
    inject_tx: mpsc::UnboundedSender<String>,
    agent_loop: AgentLoop,
}

fn harness(registry: ToolRegistry, over_budget: bool) -> Harness {
    let llm = FakeLlm::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (inject_tx, inject_rx) = mpsc::unbounded_channel();
    let interrupt = Arc::new(AtomicBool::new(false));

    let agent_loop = AgentLoop {
        task_id: TaskId::from_string("task-1"),
        chat_id: Some(1),
        instruction: "do the thing".to_string(),
        system_prompt: "you are a test agent".to_string(),
        llm: Arc::new(llm.clone()),
        registry: Arc::new(registry),
        gate: SafetyGate::new(Arc::new(llm.clone()), "light", "heavy"),
        ctx: ToolCtx {
            repo_dir: PathBuf::from("/tmp/repo"),
            data_dir: PathBuf::from("/tmp/data"),
            task_id: TaskId::from_string("task-1"),
            task_depth: 0,
            chat_id: Some(1),
        },
        events: event_tx,
        interrupt: Arc::clone(&interrupt),
        inject_rx,
        budget_exhausted: Arc::new(move || over_budget),
        config: AgentLoopConfig {
            available_models: vec!["model-a".to_string(), "model-b".to_string()],
            model: "model-a".to_string(),
            ..AgentLoopConfig::default()
        },
    };

    Harness { llm, events: event_rx, interrupt, inject_tx, agent_loop }
}

fn drain(events: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn echo_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ToolEntry::new(
        "echo",
        "echo text",
        json!({"type": "object"}),
        |_ctx, args| Ok(args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string()),
    ));
    registry
}

#[tokio::test]
async fn plain_reply_completes_with_chat_out() {
    let mut h = harness(ToolRegistry::new(), false);
    h.llm.reply_text("hello there");

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Complete { result: "hello there".to_string() });

    let events = drain(&mut h.events);
    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["llm:usage", "chat:out", "task:complete"]);
}

#[tokio::test]
async fn tool_round_trip_feeds_result_back() {
    let mut h = harness(echo_registry(), false);
    h.llm.reply_tool_call("echo", json!({"text": "pong"}));
    h.llm.reply_text("done");

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Complete { result: "done".to_string() });

    // Second request carries the assistant tool call and the tool result
    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    let last = &requests[1].messages;
    assert_eq!(last[last.len() - 2].tool_calls.len(), 1);
    assert_eq!(last[last.len() - 1].content, "pong");

    let events = drain(&mut h.events);
    let tool_events: Vec<&Event> =
        events.iter().filter(|e| e.name() == "tool:call").collect();
    assert_eq!(tool_events.len(), 1);
}

#[tokio::test]
async fn unchecked_tool_skips_the_gate() {
    let mut h = harness(echo_registry(), false);
    h.llm.reply_tool_call("echo", json!({"text": "x"}));
    h.llm.reply_text("done");

    h.agent_loop.run().await;
    // Two calls total: the task turns only, no safety calls
    assert_eq!(h.llm.call_count(), 2);

    let events = drain(&mut h.events);
    let gate = events.iter().find_map(|e| match e {
        Event::ToolCall { gate, .. } => Some(*gate),
        _ => None,
    });
    assert_eq!(gate, Some(GateDecision::Unchecked));
}

#[tokio::test]
async fn checked_tool_records_gate_decision() {
    let mut registry = ToolRegistry::new();
    registry.register(ToolEntry::new(
        "run_shell",
        "run a shell command",
        json!({"type": "object"}),
        |_ctx, _args| Ok("ran".to_string()),
    ));
    let mut h = harness(registry, false);
    h.llm.reply_tool_call("run_shell", json!({"cmd": "ls"}));
    h.llm.reply_text(r#"{"status": "SAFE", "reason": ""}"#); // fast gate verdict
    h.llm.reply_text("done");

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Complete { result: "done".to_string() });

    let events = drain(&mut h.events);
    let gate = events.iter().find_map(|e| match e {
        Event::ToolCall { gate, .. } => Some(*gate),
        _ => None,
    });
    assert_eq!(gate, Some(GateDecision::Allowed));
    // Gate usage is accounted: task turns (2) + gate call (1)
    let usage_events = events.iter().filter(|e| e.name() == "llm:usage").count();
    assert_eq!(usage_events, 3);
}

#[tokio::test]
async fn static_precheck_blocks_without_any_llm_gate_call() {
    let mut h = harness(echo_registry(), false);
    h.llm.reply_tool_call("run_shell", json!({"cmd": "rm -rf BIBLE.md"}));
    h.llm.reply_text("understood");

    h.agent_loop.run().await;

    // No safety model calls happened: just the two task turns
    assert_eq!(h.llm.call_count(), 2);
    let requests = h.llm.requests();
    let tool_result = &requests[1].messages.last().unwrap().content;
    assert!(tool_result.starts_with("⚠️ CRITICAL SAFETY_VIOLATION"));

    let events = drain(&mut h.events);
    let gate = events.iter().find_map(|e| match e {
        Event::ToolCall { gate, .. } => Some(*gate),
        _ => None,
    });
    assert_eq!(gate, Some(GateDecision::Blocked));
}

#[tokio::test]
async fn budget_exhaustion_refuses_first_turn() {
    let mut h = harness(ToolRegistry::new(), true);
    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Failed { reason: "budget".to_string() });
    assert_eq!(h.llm.call_count(), 0);

    let events = drain(&mut h.events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "task:failed");
}

#[tokio::test]
async fn preset_interrupt_cancels_before_any_call() {
    let mut h = harness(ToolRegistry::new(), false);
    h.interrupt.store(true, Ordering::SeqCst);

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Cancelled);
    assert_eq!(h.llm.call_count(), 0);

    let events = drain(&mut h.events);
    assert_eq!(events[0].name(), "task:cancelled");
}

#[tokio::test]
async fn injected_messages_appear_before_next_turn_fifo() {
    let mut h = harness(ToolRegistry::new(), false);
    h.inject_tx.send("first".to_string()).unwrap();
    h.inject_tx.send("second".to_string()).unwrap();
    h.llm.reply_text("noted");

    h.agent_loop.run().await;

    let request = &h.llm.requests()[0];
    let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
    // system, instruction, then the two injections in order
    assert_eq!(contents[1], "do the thing");
    assert_eq!(contents[2], "first");
    assert_eq!(contents[3], "second");
}

#[tokio::test]
async fn switch_model_changes_routing_until_task_end() {
    let mut h = harness(ToolRegistry::new(), false);
    h.llm.reply_tool_call("switch_model", json!({"model": "model-b", "reasoning_effort": "high"}));
    h.llm.reply_text("done");

    h.agent_loop.run().await;

    let requests = h.llm.requests();
    assert_eq!(requests[0].model, "model-a");
    assert_eq!(requests[1].model, "model-b");
    assert_eq!(requests[1].reasoning_effort, "high");
}

#[tokio::test]
async fn switch_model_rejects_unknown_model() {
    let mut h = harness(ToolRegistry::new(), false);
    h.llm.reply_tool_call("switch_model", json!({"model": "mystery"}));
    h.llm.reply_text("done");

    h.agent_loop.run().await;

    let requests = h.llm.requests();
    assert_eq!(requests[1].model, "model-a");
    assert!(requests[1].messages.last().unwrap().content.contains("Unknown model"));
}

#[tokio::test]
async fn transient_errors_retry_then_succeed() {
    let mut h = harness(ToolRegistry::new(), false);
    h.agent_loop.config.retry_limit = 2;
    h.llm.reply_err(LlmError::Http { status: 503, body: "overloaded".to_string() });
    h.llm.reply_text("recovered");

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Complete { result: "recovered".to_string() });
    assert_eq!(h.llm.call_count(), 2);
}

#[tokio::test]
async fn non_transient_error_fails_the_task() {
    let mut h = harness(ToolRegistry::new(), false);
    h.llm.reply_err(LlmError::Http { status: 401, body: "bad key".to_string() });

    let outcome = h.agent_loop.run().await;
    match outcome {
        TaskOutcome::Failed { reason } => assert!(reason.starts_with("llm:")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.llm.call_count(), 1);
}

#[tokio::test]
async fn iteration_cap_fails_runaway_loops() {
    let mut h = harness(echo_registry(), false);
    h.agent_loop.config.max_iterations = 3;
    for _ in 0..4 {
        h.llm.reply_tool_call("echo", json!({"text": "again"}));
    }

    let outcome = h.agent_loop.run().await;
    assert_eq!(outcome, TaskOutcome::Failed { reason: "max_iterations".to_string() });
}
