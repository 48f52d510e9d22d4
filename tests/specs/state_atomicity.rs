// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A reader must never observe a partial state write, no matter how
//! saves and loads interleave.

use ouro_core::{PriceTable, Usage};
use ouro_store::StateStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn concurrent_writers_and_readers_never_see_partial_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path(), PriceTable::empty(), 0.0);
    store.save(&Default::default()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();

    for _ in 0..2 {
        let store = store.clone();
        let stop = Arc::clone(&stop);
        handles.push(std::thread::spawn(move || {
            let mut writes = 0u32;
            while !stop.load(Ordering::Relaxed) {
                store
                    .update_budget("m", &Usage { cost: Some(0.001), ..Usage::default() })
                    .unwrap();
                writes += 1;
            }
            writes
        }));
    }

    // Readers parse raw bytes directly: any torn write would fail here
    let path = store.path().to_path_buf();
    for _ in 0..2 {
        let path = path.clone();
        let stop = Arc::clone(&stop);
        handles.push(std::thread::spawn(move || {
            let mut reads = 0u32;
            while !stop.load(Ordering::Relaxed) {
                let bytes = std::fs::read(&path).unwrap();
                serde_json::from_slice::<serde_json::Value>(&bytes)
                    .expect("observed a partial state write");
                reads += 1;
            }
            reads
        }));
    }

    std::thread::sleep(std::time::Duration::from_millis(300));
    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        assert!(handle.join().unwrap() > 0);
    }
}

#[test]
fn spend_accumulates_exactly_across_concurrent_updates() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path(), PriceTable::empty(), 0.0);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..25 {
                store
                    .update_budget("m", &Usage { cost: Some(0.01), ..Usage::default() })
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // 100 events at $0.01: no event double-counted or lost
    assert!((store.load().spent_usd - 1.0).abs() < 1e-9);
}
