// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::llm::ToolSpec;

#[test]
fn body_includes_tools_only_when_present() {
    let bare = ChatRequest::new(vec![ChatMessage::user("hi")], "m");
    let body = OpenRouterClient::body_for(&bare);
    assert!(body.get("tools").is_none());
    assert_eq!(body["reasoning"]["effort"], "medium");

    let with_tools = bare.clone().tools(vec![ToolSpec {
        name: "run_shell".to_string(),
        description: "run a command".to_string(),
        parameters: json!({"type": "object"}),
    }]);
    let body = OpenRouterClient::body_for(&with_tools);
    assert_eq!(body["tools"][0]["function"]["name"], "run_shell");
    assert_eq!(body["tool_choice"], "auto");
}

#[test]
fn wire_message_serializes_tool_results() {
    let msg = ChatMessage::tool_result("call-7", "done");
    let wire = wire_message(&msg);
    assert_eq!(wire["role"], "tool");
    assert_eq!(wire["tool_call_id"], "call-7");
}

#[test]
fn usage_lifts_cached_tokens_from_details() {
    let usage = parse_usage(&json!({
        "prompt_tokens": 100,
        "completion_tokens": 20,
        "total_tokens": 120,
        "prompt_tokens_details": { "cached_tokens": 80 }
    }));
    assert_eq!(usage.cached_tokens, 80);
    assert_eq!(usage.prompt_tokens, 100);
    assert!(usage.cost.is_none());
}

#[test]
fn usage_prefers_top_level_cached_tokens() {
    let usage = parse_usage(&json!({
        "prompt_tokens": 10,
        "cached_tokens": 4,
        "prompt_tokens_details": { "cached_tokens": 99 }
    }));
    assert_eq!(usage.cached_tokens, 4);
}

#[test]
fn tool_calls_parse_arguments_json() {
    let calls = parse_tool_calls(&json!({
        "tool_calls": [{
            "id": "call-1",
            "function": { "name": "run_shell", "arguments": "{\"cmd\": \"ls\"}" }
        }]
    }));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "run_shell");
    assert_eq!(calls[0].arguments["cmd"], "ls");
}

#[test]
fn malformed_arguments_survive_as_raw_string() {
    let calls = parse_tool_calls(&json!({
        "tool_calls": [{
            "id": "call-1",
            "function": { "name": "t", "arguments": "{broken" }
        }]
    }));
    assert_eq!(calls[0].arguments, Value::String("{broken".to_string()));
}
