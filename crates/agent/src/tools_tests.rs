// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn ctx() -> ToolCtx {
    ToolCtx {
        repo_dir: PathBuf::from("/tmp/repo"),
        data_dir: PathBuf::from("/tmp/data"),
        task_id: TaskId::from_string("task-1"),
        task_depth: 0,
        chat_id: Some(1),
    }
}

fn echo_entry() -> ToolEntry {
    ToolEntry::new(
        "echo",
        "echo the text argument",
        json!({"type": "object", "properties": {"text": {"type": "string"}}}),
        |_ctx, args| {
            args.get("text")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| ToolError::InvalidArgs {
                    tool: "echo".to_string(),
                    message: "missing text".to_string(),
                })
        },
    )
}

#[test]
fn register_and_execute() {
    let mut registry = ToolRegistry::new();
    registry.register(echo_entry());

    let out = registry.execute("echo", &ctx(), json!({"text": "hi"})).unwrap();
    assert_eq!(out, "hi");
}

#[test]
fn unknown_tool_lists_available() {
    let mut registry = ToolRegistry::new();
    registry.register(echo_entry());

    let err = registry.execute("nope", &ctx(), json!({})).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unknown tool: nope"));
    assert!(msg.contains("echo"));
}

#[test]
fn schemas_expose_name_and_parameters() {
    let mut registry = ToolRegistry::new();
    registry.register(echo_entry());

    let schemas = registry.schemas();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "echo");
    assert_eq!(schemas[0].parameters["type"], "object");
}

#[test]
fn timeout_defaults_and_overrides() {
    let mut registry = ToolRegistry::new();
    registry.register(echo_entry().timeout(Duration::from_secs(5)));

    assert_eq!(registry.timeout_of("echo"), Duration::from_secs(5));
    assert_eq!(registry.timeout_of("missing"), Duration::from_secs(120));
}

#[parameterized(
    shell = { "run_shell", true },
    code_edit = { "code_edit", true },
    commit = { "repo_commit", true },
    read_only = { "repo_read", false },
)]
fn checked_set(tool: &str, checked: bool) {
    assert_eq!(ToolRegistry::new().is_checked(tool), checked);
}

#[test]
fn precheck_blocks_deleting_protected_files() {
    let violation =
        static_precheck("run_shell", &json!({"cmd": "rm -rf BIBLE.md"})).unwrap();
    assert!(violation.starts_with("⚠️ CRITICAL SAFETY_VIOLATION"));

    assert!(static_precheck("run_shell", &json!({"cmd": "trash safety.rs"})).is_some());
}

#[test]
fn precheck_allows_reading_protected_files() {
    assert!(static_precheck("run_shell", &json!({"cmd": "cat BIBLE.md"})).is_none());
}

#[test]
fn precheck_allows_deleting_other_files() {
    assert!(static_precheck("run_shell", &json!({"cmd": "rm -rf target/"})).is_none());
}

#[test]
fn precheck_ignores_unchecked_tools() {
    assert!(static_precheck("web_search", &json!({"q": "delete BIBLE.md"})).is_none());
}
