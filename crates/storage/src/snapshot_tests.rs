// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ouro_core::{TaskId, TaskType};

#[test]
fn restore_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let snap = QueueSnapshot::new(dir.path());
    assert!(snap.restore().is_empty());
}

#[test]
fn persist_then_restore_preserves_order_and_content() {
    let dir = tempfile::tempdir().unwrap();
    let snap = QueueSnapshot::new(dir.path());

    let pending: Vec<Task> = (0..3)
        .map(|i| {
            Task::builder()
                .id(TaskId::from_string(format!("task-{i}")))
                .task_type(TaskType::Scheduled)
                .priority(10 - i as i64)
                .build()
        })
        .collect();

    snap.persist(&pending).unwrap();
    let restored = snap.restore();
    assert_eq!(restored, pending);
}

#[test]
fn persist_overwrites_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let snap = QueueSnapshot::new(dir.path());

    snap.persist(&[Task::builder().build()]).unwrap();
    snap.persist(&[]).unwrap();
    assert!(snap.restore().is_empty());
}

#[test]
fn corrupt_snapshot_restores_empty() {
    let dir = tempfile::tempdir().unwrap();
    let snap = QueueSnapshot::new(dir.path());
    std::fs::write(snap.path(), b"garbage").unwrap();
    assert!(snap.restore().is_empty());
}
