// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable state document store and budget accounting.

use crate::lockfile::LockFile;
use crate::{write_atomic, StoreError};
use ouro_core::{PriceTable, State, Usage};
use std::path::{Path, PathBuf};

/// Result of folding one usage record into the running spend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetDelta {
    pub added_usd: f64,
    pub spent_usd: f64,
    /// True exactly once: the update that pushed spend over the limit.
    pub crossed_limit: bool,
}

/// Load/save for `state.json`, guarded by the sentinel lock.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    prices: PriceTable,
    budget_limit_usd: f64,
}

impl StateStore {
    pub fn new(data_dir: &Path, prices: PriceTable, budget_limit_usd: f64) -> Self {
        Self { path: data_dir.join("state.json"), prices, budget_limit_usd }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state document; a missing or unreadable file yields defaults.
    pub fn load(&self) -> State {
        let _guard = LockFile::acquire(&self.path).ok();
        Self::read_unlocked(&self.path)
    }

    pub fn save(&self, state: &State) -> Result<(), StoreError> {
        let _guard = LockFile::acquire(&self.path)?;
        self.write_unlocked(state)
    }

    /// Apply a closure to the state under one lock acquisition.
    pub fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R, StoreError> {
        let _guard = LockFile::acquire(&self.path)?;
        let mut state = Self::read_unlocked(&self.path);
        let out = f(&mut state);
        self.write_unlocked(&state)?;
        Ok(out)
    }

    /// Fold one usage record into the running spend.
    ///
    /// Normalises provider-reported vs table-computed cost to a single
    /// scalar. Budget enforcement happens at admission points elsewhere;
    /// overshoot here is observed and logged, never rejected.
    pub fn update_budget(&self, model: &str, usage: &Usage) -> Result<BudgetDelta, StoreError> {
        let added = self.prices.usage_cost(model, usage);
        let limit = self.budget_limit_usd;
        self.update(|state| {
            let before = state.spent_usd;
            state.spent_usd += added;
            let crossed = limit > 0.0 && before < limit && state.spent_usd >= limit;
            if crossed {
                tracing::warn!(spent = state.spent_usd, limit, "budget limit crossed");
            }
            BudgetDelta { added_usd: added, spent_usd: state.spent_usd, crossed_limit: crossed }
        })
    }

    pub fn budget_limit_usd(&self) -> f64 {
        self.budget_limit_usd
    }

    fn read_unlocked(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::error!(path = %path.display(), error = %e, "corrupt state file, starting fresh");
                State::default()
            }),
            Err(_) => State::default(),
        }
    }

    fn write_unlocked(&self, state: &State) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
