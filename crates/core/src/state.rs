// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable supervisor state document.
//!
//! Persisted as a single JSON file through the state store. Every field is
//! serde-defaulted so documents written by older builds keep loading.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Fresh on every process start and after every accepted restart
    pub session_id: SessionId,
    /// Monotonically non-decreasing within a session
    pub spent_usd: f64,
    /// Outbound messages since the last budget line was attached
    pub budget_messages_since_report: u32,
    /// Set on the first inbound message, never overwritten
    pub owner_id: Option<i64>,
    pub owner_chat_id: Option<i64>,
    /// Mirror of the working tree after every successful repo operation
    pub current_branch: String,
    pub current_sha: String,
    pub evolution_mode_enabled: bool,
    pub evolution_cycle: u32,
    /// `spent_usd` at the moment the last evolution task was queued
    pub evo_cost_at_last_task: f64,
    pub last_owner_message_at: Option<String>,
    pub last_review_at: Option<String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            session_id: SessionId::new(),
            spent_usd: 0.0,
            budget_messages_since_report: 0,
            owner_id: None,
            owner_chat_id: None,
            current_branch: String::new(),
            current_sha: String::new(),
            evolution_mode_enabled: false,
            evolution_cycle: 0,
            evo_cost_at_last_task: 0.0,
            last_owner_message_at: None,
            last_review_at: None,
        }
    }
}

impl State {
    /// Record the owner on first contact; later calls are no-ops.
    pub fn claim_owner(&mut self, user_id: i64, chat_id: i64) {
        if self.owner_id.is_none() {
            self.owner_id = Some(user_id);
            self.owner_chat_id = Some(chat_id);
        }
    }

    /// Rotate the session id (process start, accepted restart).
    pub fn rotate_session(&mut self) {
        self.session_id = SessionId::new();
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
