// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-queue snapshot for crash recovery.
//!
//! The entire pending list is serialised atomically after every main-loop
//! tick and on startup/restart; running tasks are not snapshotted (they are
//! re-queued by the pool's auto-resume instead).

use crate::{write_atomic, StoreError};
use ouro_core::Task;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc {
    #[serde(rename = "v")]
    version: u32,
    pending: Vec<Task>,
}

const SNAPSHOT_VERSION: u32 = 1;

/// `queue.json` persistence.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    path: PathBuf,
}

impl QueueSnapshot {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("queue.json") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialise the pending list, atomically replacing the previous snapshot.
    pub fn persist(&self, pending: &[Task]) -> Result<(), StoreError> {
        let doc = SnapshotDoc { version: SNAPSHOT_VERSION, pending: pending.to_vec() };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&doc)?)
    }

    /// Restore the pending list. Missing file means an empty queue;
    /// a corrupt file is logged and treated the same.
    pub fn restore(&self) -> Vec<Task> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice::<SnapshotDoc>(&bytes) {
            Ok(doc) => doc.pending,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "corrupt queue snapshot");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
