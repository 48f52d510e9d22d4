// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    known_passthrough = { "high", "high" },
    uppercase = { " XHIGH ", "xhigh" },
    unknown_falls_back = { "turbo", "medium" },
    empty_falls_back = { "", "medium" },
)]
fn effort_normalization(input: &str, expected: &str) {
    assert_eq!(normalize_reasoning_effort(input, "medium"), expected);
}

#[test]
fn effort_ranks_are_ordered() {
    assert!(reasoning_rank("none") < reasoning_rank("low"));
    assert!(reasoning_rank("low") < reasoning_rank("high"));
    assert!(reasoning_rank("high") < reasoning_rank("xhigh"));
    // Unknown ranks as medium
    assert_eq!(reasoning_rank("???"), reasoning_rank("medium"));
}

#[test]
fn transient_classification() {
    assert!(LlmError::Transport("reset".to_string()).is_transient());
    assert!(LlmError::Http { status: 502, body: String::new() }.is_transient());
    assert!(LlmError::Http { status: 429, body: String::new() }.is_transient());
    assert!(!LlmError::Http { status: 401, body: String::new() }.is_transient());
    assert!(!LlmError::InvalidResponse("nope".to_string()).is_transient());
}

#[test]
fn message_constructors_set_roles() {
    assert_eq!(ChatMessage::system("s").role, Role::System);
    assert_eq!(ChatMessage::user("u").role, Role::User);
    let tool = ChatMessage::tool_result("call-1", "out");
    assert_eq!(tool.role, Role::Tool);
    assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
}
