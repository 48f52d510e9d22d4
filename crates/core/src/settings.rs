// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing configuration.

use serde::{Deserialize, Serialize};

/// Settings persisted to `settings.json` in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OpenRouter-compatible API key
    pub api_key: String,
    /// Main conversational model
    pub model_main: String,
    /// Model for code-heavy tasks and the deep safety check
    pub model_code: String,
    /// Light model for the fast safety check
    pub model_light: String,
    pub max_workers: u32,
    pub total_budget_usd: f64,
    pub soft_timeout_secs: u64,
    pub hard_timeout_secs: u64,
    /// Consciousness: LLM rounds per wake
    pub bg_max_rounds: u32,
    pub bg_wakeup_min_secs: u64,
    pub bg_wakeup_max_secs: u64,
    /// Spend since the last evolution task that triggers the next one
    pub evo_cost_threshold_usd: f64,
    /// Attach a budget line every N outbound messages
    pub budget_report_every: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_main: "anthropic/claude-sonnet-4.6".to_string(),
            model_code: "anthropic/claude-sonnet-4.6".to_string(),
            model_light: "google/gemini-3-flash-preview".to_string(),
            max_workers: 5,
            total_budget_usd: 10.0,
            soft_timeout_secs: 600,
            hard_timeout_secs: 1800,
            bg_max_rounds: 5,
            bg_wakeup_min_secs: 30,
            bg_wakeup_max_secs: 7200,
            evo_cost_threshold_usd: 0.10,
            budget_report_every: 10,
        }
    }
}

impl Settings {
    /// Copy with secret fields masked, for read-side exposure.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            copy.api_key = "********".to_string();
        }
        copy
    }

    /// Models offered to the `switch_model` tool, deduplicated.
    pub fn available_models(&self) -> Vec<String> {
        let mut models = vec![self.model_main.clone()];
        for m in [&self.model_code, &self.model_light] {
            if !m.is_empty() && !models.contains(m) {
                models.push(m.clone());
            }
        }
        models
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
