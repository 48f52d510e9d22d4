// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings persistence (`settings.json`), locked and atomic like the state.

use crate::lockfile::LockFile;
use crate::{write_atomic, StoreError};
use ouro_core::Settings;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("settings.json") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; missing or unreadable files yield the defaults.
    pub fn load(&self) -> Settings {
        let _guard = LockFile::acquire(&self.path).ok();
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::error!(path = %self.path.display(), error = %e, "corrupt settings, using defaults");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _guard = LockFile::acquire(&self.path)?;
        write_atomic(&self.path, &serde_json::to_vec_pretty(settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path());
        let mut settings = Settings::default();
        settings.max_workers = 2;
        settings.api_key = "sk-or-test".to_string();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }
}
