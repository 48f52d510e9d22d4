// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The LLM client seam.
//!
//! The supervisor treats the provider as an opaque capability behind
//! [`LlmClient`]; [`OpenRouterClient`] is the production implementation and
//! `FakeLlm` (test-support) the scripted double.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
mod openrouter;

pub use openrouter::OpenRouterClient;

use async_trait::async_trait;
use ouro_core::Usage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasoning effort tiers accepted by the API, lowest to highest.
const EFFORT_ORDER: [&str; 6] = ["none", "minimal", "low", "medium", "high", "xhigh"];

/// Clamp an arbitrary string to a known effort tier.
pub fn normalize_reasoning_effort(value: &str, default: &str) -> String {
    let v = value.trim().to_lowercase();
    if EFFORT_ORDER.contains(&v.as_str()) {
        v
    } else {
        default.to_string()
    }
}

/// Rank of an effort tier for comparisons; unknown ranks as "medium".
pub fn reasoning_rank(value: &str) -> usize {
    let v = value.trim().to_lowercase();
    EFFORT_ORDER.iter().position(|e| *e == v).unwrap_or(3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

/// One entry of the conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set on `Tool` messages: the call this result answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls, tool_call_id: None }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Function schema offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub tools: Vec<ToolSpec>,
    pub reasoning_effort: String,
    pub max_tokens: u32,
    pub tool_choice: String,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        Self {
            messages,
            model: model.into(),
            tools: Vec::new(),
            reasoning_effort: "medium".to_string(),
            max_tokens: 16384,
            tool_choice: "auto".to_string(),
        }
    }

    ouro_core::setters! {
        into {
            reasoning_effort: String,
        }
        set {
            tools: Vec<ToolSpec>,
            max_tokens: u32,
        }
    }
}

/// The model's reply to one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantMsg {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Transient errors are retried with back-off by the agent loop.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(_) => true,
            LlmError::Http { status, .. } => *status >= 500 || *status == 429,
            LlmError::InvalidResponse(_) => false,
        }
    }
}

/// The opaque provider capability handed to the supervisor at startup.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<(AssistantMsg, Usage), LlmError>;
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
