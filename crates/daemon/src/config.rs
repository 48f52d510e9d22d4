// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon paths and derived runtime configuration.

use std::path::PathBuf;

pub const BRANCH_DEV: &str = "ouroboros";
pub const BRANCH_STABLE: &str = "ouroboros-stable";

/// Filesystem layout for one daemon instance.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// User data directory: settings, state, queue snapshot, logs
    pub data_dir: PathBuf,
    /// The version-controlled working tree the agent evolves
    pub repo_dir: PathBuf,
    pub branch_dev: String,
    pub branch_stable: String,
}

impl DaemonConfig {
    pub fn new(data_dir: impl Into<PathBuf>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            repo_dir: repo_dir.into(),
            branch_dev: BRANCH_DEV.to_string(),
            branch_stable: BRANCH_STABLE.to_string(),
        }
    }

    /// Default layout under the platform data directory.
    pub fn default_paths() -> Self {
        let root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Ouroboros");
        Self::new(root.join("data"), root.join("repo"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
