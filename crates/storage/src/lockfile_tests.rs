// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn acquire_creates_and_drop_removes_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("state.json");
    let sentinel = LockFile::lock_path(&target);

    let guard = LockFile::acquire(&target).unwrap();
    assert!(sentinel.exists());
    drop(guard);
    assert!(!sentinel.exists());
}

#[test]
fn held_lock_blocks_second_acquire() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("state.json");

    let _guard = LockFile::acquire(&target).unwrap();
    let err = LockFile::acquire(&target);
    assert!(matches!(err, Err(StoreError::LockTimeout { .. })));
}

#[test]
fn stale_sentinel_is_stolen() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("state.json");
    let sentinel = LockFile::lock_path(&target);

    // An abandoned sentinel from a dead process, older than the TTL
    std::fs::write(&sentinel, b"").unwrap();
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
    let file = std::fs::OpenOptions::new().write(true).open(&sentinel).unwrap();
    file.set_modified(old).unwrap();
    drop(file);

    let guard = LockFile::acquire(&target);
    assert!(guard.is_ok());
}

#[test]
fn lock_path_appends_suffix() {
    let p = LockFile::lock_path(Path::new("/data/settings.json"));
    assert_eq!(p, Path::new("/data/settings.json.lock"));
}
