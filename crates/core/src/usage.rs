// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM usage accounting and pricing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token usage from one LLM call, plus provider-reported cost when available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
    /// Provider-reported USD cost. Wins over table pricing when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Accumulate usage from one LLM call into a running total.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cached_tokens += other.cached_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        if let Some(c) = other.cost {
            self.cost = Some(self.cost.unwrap_or(0.0) + c);
        }
    }
}

/// Per-model pricing, USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1m: f64,
    pub cached_per_1m: f64,
    pub output_per_1m: f64,
}

/// Pricing table keyed by model id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    models: HashMap<String, ModelPrice>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "anthropic/claude-sonnet-4.6".to_string(),
            ModelPrice { input_per_1m: 3.0, cached_per_1m: 0.3, output_per_1m: 15.0 },
        );
        models.insert(
            "anthropic/claude-opus-4".to_string(),
            ModelPrice { input_per_1m: 15.0, cached_per_1m: 1.5, output_per_1m: 75.0 },
        );
        models.insert(
            "google/gemini-2.5-flash".to_string(),
            ModelPrice { input_per_1m: 0.3, cached_per_1m: 0.03, output_per_1m: 2.5 },
        );
        models.insert(
            "google/gemini-3-flash-preview".to_string(),
            ModelPrice { input_per_1m: 0.3, cached_per_1m: 0.03, output_per_1m: 2.5 },
        );
        models.insert(
            "openai/o3".to_string(),
            ModelPrice { input_per_1m: 2.0, cached_per_1m: 0.5, output_per_1m: 8.0 },
        );
        Self { models }
    }
}

impl PriceTable {
    pub fn empty() -> Self {
        Self { models: HashMap::new() }
    }

    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.models.insert(model.into(), price);
    }

    pub fn get(&self, model: &str) -> Option<ModelPrice> {
        self.models.get(model).copied()
    }

    /// Table-computed USD cost for one call.
    ///
    /// Cached tokens are billed at the cached rate and subtracted from prompt
    /// tokens before pricing. Unknown models price at zero.
    pub fn cost_of(&self, model: &str, usage: &Usage) -> f64 {
        let Some(price) = self.get(model) else {
            return 0.0;
        };
        let cached = usage.cached_tokens.min(usage.prompt_tokens);
        let uncached_prompt = usage.prompt_tokens - cached;
        (uncached_prompt as f64 * price.input_per_1m
            + cached as f64 * price.cached_per_1m
            + usage.completion_tokens as f64 * price.output_per_1m)
            / 1_000_000.0
    }

    /// USD cost for one call: provider-reported when present, table otherwise.
    ///
    /// This is the normalisation point — downstream consumers only ever see
    /// the single scalar returned here.
    pub fn usage_cost(&self, model: &str, usage: &Usage) -> f64 {
        match usage.cost {
            Some(c) => c,
            None => self.cost_of(model, usage),
        }
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
