// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending work must survive a process exit that happens any time after
//! `persist()` returns.

use ouro_core::{FakeClock, Task, TaskId, TaskType};
use ouro_daemon::TaskQueue;
use ouro_store::QueueSnapshot;

#[test]
fn restart_restores_exactly_the_snapshotted_pending_set() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();

    let original: Vec<Task> = {
        let mut queue = TaskQueue::new(QueueSnapshot::new(dir.path()), clock.clone());
        for (i, (priority, task_type)) in [
            (100, TaskType::UserRequest),
            (20, TaskType::Evolution),
            (50, TaskType::Review),
        ]
        .iter()
        .enumerate()
        {
            queue.enqueue(
                Task::builder()
                    .id(TaskId::from_string(format!("task-{i}")))
                    .priority(*priority)
                    .task_type(*task_type)
                    .created_at_ms(1000 + i as u64)
                    .build(),
            );
        }
        queue.persist();
        queue.pending().to_vec()
        // Queue dropped here: the "process" is gone
    };

    let mut revived = TaskQueue::new(QueueSnapshot::new(dir.path()), clock);
    assert_eq!(revived.restore(), 3);
    assert_eq!(revived.pending(), original.as_slice());
}

#[test]
fn snapshot_survives_repeated_restart_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();

    {
        let mut queue = TaskQueue::new(QueueSnapshot::new(dir.path()), clock.clone());
        queue.enqueue(Task::builder().id(TaskId::from_string("task-keep")).build());
    }
    for _ in 0..3 {
        let mut queue = TaskQueue::new(QueueSnapshot::new(dir.path()), clock.clone());
        assert_eq!(queue.restore(), 1);
        queue.persist();
    }

    let mut queue = TaskQueue::new(QueueSnapshot::new(dir.path()), clock);
    queue.restore();
    assert_eq!(queue.pending()[0].id, "task-keep");
}
