// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat log records.

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// Direction of a chat message relative to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

crate::simple_display! {
    Direction {
        In => "in",
        Out => "out",
    }
}

/// One line of `chat.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub ts: String,
    pub session_id: SessionId,
    pub direction: Direction,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

impl ChatRecord {
    pub fn new(
        session_id: SessionId,
        direction: Direction,
        chat_id: i64,
        user_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            ts: crate::clock::utc_iso_now(),
            session_id,
            direction,
            chat_id,
            user_id,
            text: text.into(),
        }
    }
}
