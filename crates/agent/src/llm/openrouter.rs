// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenRouter-compatible chat-completions client.

use super::{AssistantMsg, ChatMessage, ChatRequest, LlmClient, LlmError, Role, ToolCallRequest};
use async_trait::async_trait;
use ouro_core::Usage;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client against an OpenAI-compatible chat-completions endpoint.
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("ouroboros/0.2")
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
    }

    fn body_for(request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "reasoning": { "effort": request.reasoning_effort, "exclude": true },
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(
                request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
            body["tool_choice"] = Value::String(request.tool_choice.clone());
        }
        body
    }
}

fn wire_message(msg: &ChatMessage) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut out = json!({ "role": role, "content": msg.content });
    if !msg.tool_calls.is_empty() {
        out["tool_calls"] = Value::Array(
            msg.tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": {
                            "name": c.name,
                            "arguments": c.arguments.to_string(),
                        }
                    })
                })
                .collect(),
        );
    }
    if let Some(id) = &msg.tool_call_id {
        out["tool_call_id"] = Value::String(id.clone());
    }
    out
}

/// Parse the provider's usage block, lifting cached-token counts out of
/// `prompt_tokens_details` when the top-level field is absent.
fn parse_usage(value: &Value) -> Usage {
    let u = |k: &str| value.get(k).and_then(Value::as_u64).unwrap_or(0);
    let details = value.get("prompt_tokens_details");
    let detail = |k: &str| details.and_then(|d| d.get(k)).and_then(Value::as_u64).unwrap_or(0);

    let cached = match u("cached_tokens") {
        0 => detail("cached_tokens"),
        n => n,
    };
    let cache_write = match u("cache_write_tokens") {
        0 => detail("cache_write_tokens").max(detail("cache_creation_tokens")),
        n => n,
    };

    Usage {
        prompt_tokens: u("prompt_tokens"),
        completion_tokens: u("completion_tokens"),
        total_tokens: u("total_tokens"),
        cached_tokens: cached,
        cache_write_tokens: cache_write,
        cost: value.get("cost").and_then(Value::as_f64),
    }
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCallRequest> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|c| {
            let id = c.get("id")?.as_str()?.to_string();
            let function = c.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let raw = function.get("arguments").and_then(Value::as_str).unwrap_or("{}");
            // Malformed argument JSON still reaches the loop, as a string the
            // tool handler can reject with a readable error
            let arguments =
                serde_json::from_str(raw).unwrap_or(Value::String(raw.to_string()));
            Some(ToolCallRequest { id, name, arguments })
        })
        .collect()
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat(&self, request: ChatRequest) -> Result<(AssistantMsg, Usage), LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = Self::body_for(&request);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| LlmError::Transport(e.to_string()))?;
        if status >= 400 {
            return Err(LlmError::Http { status, body: text });
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("{e}: {text}")))?;
        let message = parsed
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let msg = AssistantMsg {
            content: message.get("content").and_then(Value::as_str).unwrap_or("").to_string(),
            tool_calls: parse_tool_calls(message),
        };
        let usage = parsed.get("usage").map(parse_usage).unwrap_or_default();

        tracing::debug!(
            model = %request.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            tool_calls = msg.tool_calls.len(),
            "llm call complete"
        );
        Ok((msg, usage))
    }
}

#[cfg(test)]
#[path = "openrouter_tests.rs"]
mod tests;
