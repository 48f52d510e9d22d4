// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_stock_configuration() {
    let s = Settings::default();
    assert_eq!(s.max_workers, 5);
    assert_eq!(s.total_budget_usd, 10.0);
    assert_eq!(s.soft_timeout_secs, 600);
    assert_eq!(s.hard_timeout_secs, 1800);
    assert_eq!(s.evo_cost_threshold_usd, 0.10);
    assert_eq!(s.budget_report_every, 10);
}

#[test]
fn redacted_masks_api_key_only() {
    let mut s = Settings::default();
    s.api_key = "sk-or-secret".to_string();
    let r = s.redacted();
    assert_eq!(r.api_key, "********");
    assert_eq!(r.model_main, s.model_main);

    // Empty key stays empty so the UI can tell "unset" from "set"
    s.api_key.clear();
    assert_eq!(s.redacted().api_key, "");
}

#[test]
fn available_models_deduplicates() {
    let mut s = Settings::default();
    s.model_code = s.model_main.clone();
    let models = s.available_models();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0], s.model_main);
    assert_eq!(models[1], s.model_light);
}

#[test]
fn partial_file_fills_defaults() {
    let s: Settings = serde_json::from_str(r#"{"max_workers": 2}"#).unwrap();
    assert_eq!(s.max_workers, 2);
    assert_eq!(s.total_budget_usd, 10.0);
}
