// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI-agnostic message bus.
//!
//! Two queues bridge the supervisor and whatever UI is attached: an inbox of
//! user text (drained as Telegram-shaped updates) and an outbox of agent
//! messages. A bounded log queue streams freshly-appended JSONL records with
//! drop-oldest-on-full. An optional broadcast callback mirrors outbound
//! traffic synchronously (live WebSocket fan-out on the host side).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Capacity of the log queue; older entries are dropped first.
const LOG_QUEUE_CAP: usize = 1000;

/// Max entries handed out per `ui_poll_logs` call.
const LOG_POLL_BATCH: usize = 50;

/// Message length limit per chunk handed to the UI.
const MESSAGE_LIMIT: usize = 4000;

/// One inbound user update in the Telegram-like shape the supervisor drains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub update_id: u64,
    pub chat_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Outbound message for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Text { content: String, markdown: bool },
    Action { action: String },
    Photo { bytes: Vec<u8>, caption: String },
}

/// Synchronous mirror of outbound traffic (chat and log records).
pub type BroadcastFn = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

#[derive(Default)]
struct BusState {
    inbox: VecDeque<String>,
    outbox: VecDeque<BusMessage>,
    logs: VecDeque<serde_json::Value>,
    update_counter: u64,
}

/// Queue-backed bridge between the supervisor loop and the UI host.
#[derive(Clone)]
pub struct MessageBus {
    state: Arc<Mutex<BusState>>,
    inbox_notify: Arc<Notify>,
    outbox_notify: Arc<Notify>,
    broadcast: Arc<Mutex<Option<BroadcastFn>>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            inbox_notify: Arc::new(Notify::new()),
            outbox_notify: Arc::new(Notify::new()),
            broadcast: Arc::new(Mutex::new(None)),
        }
    }

    /// Register the live fan-out callback.
    pub fn set_broadcast(&self, f: BroadcastFn) {
        *self.broadcast.lock() = Some(f);
    }

    fn mirror(&self, value: &serde_json::Value) {
        if let Some(f) = self.broadcast.lock().as_ref() {
            f(value);
        }
    }

    // --- supervisor side ---

    /// Drain pending user input, blocking up to `timeout` when empty.
    ///
    /// The local bridge serves a single owner, so chat and user ids are
    /// fixed at 1.
    pub async fn get_updates(&self, offset: u64, timeout: Duration) -> Vec<Update> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock();
                if !state.inbox.is_empty() {
                    let mut updates = Vec::with_capacity(state.inbox.len());
                    while let Some(text) = state.inbox.pop_front() {
                        state.update_counter = state.update_counter.max(offset) + 1;
                        updates.push(Update {
                            update_id: state.update_counter,
                            chat_id: 1,
                            user_id: 1,
                            text,
                        });
                    }
                    return updates;
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Vec::new();
            }
            let _ = tokio::time::timeout(remaining, self.inbox_notify.notified()).await;
        }
    }

    /// Push a message to the UI. Markdown is stripped unless opted in.
    /// Long messages are split on line boundaries.
    pub fn send(&self, _chat_id: i64, text: &str, markdown: bool) {
        let clean = if markdown { text.to_string() } else { strip_markdown(text) };
        for part in split_message(&clean, MESSAGE_LIMIT) {
            self.state
                .lock()
                .outbox
                .push_back(BusMessage::Text { content: part.clone(), markdown });
            self.mirror(&serde_json::json!({
                "type": "chat", "role": "assistant", "content": part,
            }));
        }
        self.outbox_notify.notify_waiters();
    }

    /// Typing indicator and friends.
    pub fn send_action(&self, _chat_id: i64, action: &str) {
        self.state.lock().outbox.push_back(BusMessage::Action { action: action.to_string() });
        self.outbox_notify.notify_waiters();
    }

    pub fn send_photo(&self, _chat_id: i64, bytes: Vec<u8>, caption: &str) {
        self.state
            .lock()
            .outbox
            .push_back(BusMessage::Photo { bytes, caption: caption.to_string() });
        self.outbox_notify.notify_waiters();
    }

    /// Sink for the JSONL store: stream appended records to subscribers.
    pub fn push_log(&self, record: &serde_json::Value) {
        {
            let mut state = self.state.lock();
            if state.logs.len() >= LOG_QUEUE_CAP {
                state.logs.pop_front();
            }
            state.logs.push_back(record.clone());
        }
        self.mirror(&serde_json::json!({ "type": "log", "data": record }));
    }

    // --- UI side ---

    /// Send a message to the agent.
    pub fn ui_send(&self, text: impl Into<String>) {
        self.state.lock().inbox.push_back(text.into());
        self.inbox_notify.notify_waiters();
    }

    /// Check for a message from the agent, waiting up to `timeout`.
    pub async fn ui_receive(&self, timeout: Duration) -> Option<BusMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(msg) = self.state.lock().outbox.pop_front() {
                return Some(msg);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let _ = tokio::time::timeout(remaining, self.outbox_notify.notified()).await;
        }
    }

    /// Drain pending log records (bounded batch).
    pub fn ui_poll_logs(&self) -> Vec<serde_json::Value> {
        let mut state = self.state.lock();
        let take = state.logs.len().min(LOG_POLL_BATCH);
        state.logs.drain(..take).collect()
    }
}

/// Split on line boundaries at `limit` chars; a line longer than the limit
/// is cut mid-line.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > limit {
        let mut cap = limit;
        while !rest.is_char_boundary(cap) {
            cap -= 1;
        }
        let cut = match rest[..cap].rfind('\n') {
            Some(i) if i >= 100 => i,
            _ => cap,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks.push(rest.to_string());
    chunks
}

/// Strip markdown decoration, preserving body text.
pub fn strip_markdown(text: &str) -> String {
    // Build-once regexes; the pattern set mirrors what the UI can't render
    static PATTERNS: std::sync::OnceLock<Vec<(regex::Regex, &'static str)>> =
        std::sync::OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            (r"```[^\n]*\n([\s\S]*?)```", "$1"),
            (r"`([^`]+)`", "$1"),
            (r"\*\*\*(.+?)\*\*\*", "$1"),
            (r"\*\*(.+?)\*\*", "$1"),
            // Single-star italic; runs after the bold passes so remaining
            // stars are lone emphasis markers
            (r"\*([^*\n]+)\*", "$1"),
            // `_` is a word character, so \b_ ... _\b means "not inside a
            // word" and leaves snake_case identifiers alone
            (r"\b_([^_\n]+)_\b", "$1"),
            (r"(?m)^#{1,6}\s+", ""),
            (r"(?m)^[*\-]\s+", "• "),
            (r"~~(.+?)~~", "$1"),
            (r"\[([^\]]+)\]\([^)]+\)", "$1"),
        ]
        .into_iter()
        .filter_map(|(pattern, rep)| regex::Regex::new(pattern).ok().map(|re| (re, rep)))
        .collect()
    });

    let mut out = text.to_string();
    for (re, rep) in patterns {
        out = re.replace_all(&out, *rep).into_owned();
    }
    // Leftover emphasis runs
    for marker in ["**", "__", "~~", "`"] {
        out = out.replace(marker, "");
    }
    out
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
