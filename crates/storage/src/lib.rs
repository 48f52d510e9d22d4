// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ouro-store: durable state for the Ouroboros supervisor.
//!
//! Everything here writes through the same two disciplines: a cooperative
//! sentinel lock (exclusive create, staleness TTL) and atomic
//! temp-file-then-rename replacement.

mod error;
mod jsonl;
mod lockfile;
mod settings_store;
mod snapshot;
mod state_store;

pub use error::StoreError;
pub use jsonl::{JsonlLogs, LogKind, LogSink};
pub use lockfile::LockFile;
pub use settings_store::SettingsStore;
pub use snapshot::QueueSnapshot;
pub use state_store::{BudgetDelta, StateStore};

use std::path::Path;

/// Write `bytes` to `path` atomically: temp file in the same directory,
/// then rename over the target.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
