// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted LLM double for tests.

use super::{AssistantMsg, ChatRequest, LlmClient, LlmError, ToolCallRequest};
use async_trait::async_trait;
use ouro_core::Usage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct ScriptedReply {
    delay: Option<std::time::Duration>,
    result: Result<(AssistantMsg, Usage), LlmError>,
}

/// Replays scripted replies in order and journals every request it saw.
/// When the script runs dry it answers with plain `"ok"`.
#[derive(Clone, Default)]
pub struct FakeLlm {
    script: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text reply.
    pub fn reply_text(&self, text: &str) -> &Self {
        self.push(Ok((
            AssistantMsg { content: text.to_string(), tool_calls: Vec::new() },
            Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15, ..Usage::default() },
        )));
        self
    }

    /// Queue a plain-text reply delivered after a delay (simulates a slow
    /// provider; pairs with paused-time tests).
    pub fn reply_text_delayed(&self, text: &str, delay: std::time::Duration) -> &Self {
        self.script.lock().push_back(ScriptedReply {
            delay: Some(delay),
            result: Ok((
                AssistantMsg { content: text.to_string(), tool_calls: Vec::new() },
                Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                    ..Usage::default()
                },
            )),
        });
        self
    }

    /// Queue a reply that requests one tool call.
    pub fn reply_tool_call(&self, name: &str, arguments: serde_json::Value) -> &Self {
        self.push(Ok(Self::tool_call_reply(name, arguments, self.script.lock().len())));
        self
    }

    /// Queue a tool-call reply delivered after a delay.
    pub fn reply_tool_call_delayed(
        &self,
        name: &str,
        arguments: serde_json::Value,
        delay: std::time::Duration,
    ) -> &Self {
        let reply = Self::tool_call_reply(name, arguments, self.script.lock().len());
        self.script.lock().push_back(ScriptedReply { delay: Some(delay), result: Ok(reply) });
        self
    }

    fn tool_call_reply(
        name: &str,
        arguments: serde_json::Value,
        seq: usize,
    ) -> (AssistantMsg, Usage) {
        (
            AssistantMsg {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: format!("call-{seq}"),
                    name: name.to_string(),
                    arguments,
                }],
            },
            Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15, ..Usage::default() },
        )
    }

    /// Queue an error reply.
    pub fn reply_err(&self, err: LlmError) -> &Self {
        self.push(Err(err));
        self
    }

    fn push(&self, result: Result<(AssistantMsg, Usage), LlmError>) {
        self.script.lock().push_back(ScriptedReply { delay: None, result });
    }

    /// Requests journalled so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn chat(&self, request: ChatRequest) -> Result<(AssistantMsg, Usage), LlmError> {
        self.requests.lock().push(request);
        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(reply) => {
                if let Some(delay) = reply.delay {
                    tokio::time::sleep(delay).await;
                }
                reply.result
            }
            None => Ok((
                AssistantMsg { content: "ok".to_string(), tool_calls: Vec::new() },
                Usage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                    ..Usage::default()
                },
            )),
        }
    }
}
