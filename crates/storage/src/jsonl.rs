// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rotating JSONL append logs.
//!
//! Single entry point for `chat.jsonl`, `tools.jsonl`, `events.jsonl`, and
//! `progress.jsonl`. A registered sink fires synchronously on every append
//! so newly-written records stream to live UI subscribers.

use crate::StoreError;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which append log a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Chat,
    Tools,
    Events,
    Progress,
}

impl LogKind {
    pub fn file_name(self) -> &'static str {
        match self {
            LogKind::Chat => "chat.jsonl",
            LogKind::Tools => "tools.jsonl",
            LogKind::Events => "events.jsonl",
            LogKind::Progress => "progress.jsonl",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Callback invoked synchronously with every appended record.
pub type LogSink = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Size past which a log file rotates.
const ROTATE_BYTES: u64 = 2 * 1024 * 1024;

/// Historical files kept per log (`.1` newest … `.3` oldest).
const MAX_ROTATED: u32 = 3;

/// Append-only JSONL logs under `logs/` in the data directory.
#[derive(Clone)]
pub struct JsonlLogs {
    dir: PathBuf,
    sink: Arc<Mutex<Option<LogSink>>>,
}

impl JsonlLogs {
    pub fn new(data_dir: &Path) -> Self {
        Self { dir: data_dir.join("logs"), sink: Arc::new(Mutex::new(None)) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: LogKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Register the live-streaming sink (set by the message bus).
    pub fn set_sink(&self, sink: LogSink) {
        *self.sink.lock() = Some(sink);
    }

    /// Append one record, rotating first if the file is oversized.
    pub fn append(&self, kind: LogKind, record: &serde_json::Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(kind);
        rotate_if_oversized(&path)?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;

        if let Some(sink) = self.sink.lock().as_ref() {
            sink(record);
        }
        Ok(())
    }

    /// Rotate `chat.jsonl` if oversized (called from the supervisor tick).
    pub fn rotate_chat_if_needed(&self) -> Result<(), StoreError> {
        rotate_if_oversized(&self.path(LogKind::Chat))
    }

    /// Delete all current and rotated log files (`/api/reset` support).
    pub fn clear(&self) -> Result<(), StoreError> {
        for kind in [LogKind::Chat, LogKind::Tools, LogKind::Events, LogKind::Progress] {
            let path = self.path(kind);
            let _ = fs::remove_file(&path);
            for n in 1..=MAX_ROTATED {
                let _ = fs::remove_file(rotated_path(&path, n));
            }
        }
        Ok(())
    }
}

fn rotated_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{n}"));
    path.with_file_name(name)
}

/// Shift `log.jsonl` → `.1` → `.2` → `.3` when the live file passes the cap.
fn rotate_if_oversized(path: &Path) -> Result<(), StoreError> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(()),
    };
    if size <= ROTATE_BYTES {
        return Ok(());
    }

    let oldest = rotated_path(path, MAX_ROTATED);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_ROTATED).rev() {
        let src = rotated_path(path, n);
        if src.exists() {
            let _ = fs::rename(&src, rotated_path(path, n + 1));
        }
    }
    fs::rename(path, rotated_path(path, 1))?;
    Ok(())
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
