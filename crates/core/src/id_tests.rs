// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::task::TaskId;
use crate::WorkerId;

#[test]
fn generated_ids_carry_prefix() {
    let id = TaskId::new();
    assert!(id.as_str().starts_with("task-"));
    assert_eq!(id.as_str().len(), "task-".len() + 12);
}

#[test]
fn generated_ids_are_unique() {
    let a = WorkerId::new();
    let b = WorkerId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = TaskId::from_string("task-abc");
    assert_eq!(id, "task-abc");
    assert_eq!(id.to_string(), "task-abc");
}

#[test]
fn serde_is_transparent() {
    let id = TaskId::from_string("task-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"task-xyz\"");
    let parsed: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn short_truncates() {
    let id = TaskId::from_string("task-0123456789");
    assert_eq!(id.short(7), "task-01");
    assert_eq!(id.short(100), "task-0123456789");
}
