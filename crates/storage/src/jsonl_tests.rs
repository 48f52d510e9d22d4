// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn append_writes_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let logs = JsonlLogs::new(dir.path());

    logs.append(LogKind::Chat, &json!({"direction": "in", "text": "hello"})).unwrap();
    logs.append(LogKind::Chat, &json!({"direction": "out", "text": "hi"})).unwrap();

    let content = std::fs::read_to_string(logs.path(LogKind::Chat)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["direction"], "in");
}

#[test]
fn sink_fires_synchronously_on_append() {
    let dir = tempfile::tempdir().unwrap();
    let logs = JsonlLogs::new(dir.path());

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    logs.set_sink(Arc::new(move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
    }));

    logs.append(LogKind::Events, &json!({"type": "log"})).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn oversized_file_rotates_keeping_three_backups() {
    let dir = tempfile::tempdir().unwrap();
    let logs = JsonlLogs::new(dir.path());
    std::fs::create_dir_all(logs.dir()).unwrap();
    let live = logs.path(LogKind::Progress);

    for round in 0..4u8 {
        std::fs::write(&live, vec![b'0' + round; 3 * 1024 * 1024]).unwrap();
        logs.append(LogKind::Progress, &json!({"round": round})).unwrap();
    }

    // Live file holds only the newest record; .1/.2/.3 exist, nothing older
    let content = std::fs::read_to_string(&live).unwrap();
    assert_eq!(content.lines().count(), 1);
    for n in 1..=3u32 {
        let mut name = live.file_name().unwrap().to_os_string();
        name.push(format!(".{n}"));
        assert!(live.with_file_name(&name).exists(), "missing rotation .{n}");
    }
    let mut name4 = live.file_name().unwrap().to_os_string();
    name4.push(".4");
    assert!(!live.with_file_name(name4).exists());
}

#[test]
fn clear_removes_all_log_files() {
    let dir = tempfile::tempdir().unwrap();
    let logs = JsonlLogs::new(dir.path());
    logs.append(LogKind::Tools, &json!({"tool": "run_shell"})).unwrap();
    logs.append(LogKind::Chat, &json!({"text": "x"})).unwrap();

    logs.clear().unwrap();
    assert!(!logs.path(LogKind::Tools).exists());
    assert!(!logs.path(LogKind::Chat).exists());
}
