// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-task LLM↔tool reasoning loop.
//!
//! Cooperative cancellation is checked at exactly two points: between LLM
//! turns and between tool calls. Tool handlers get their declared timeout;
//! the loop as a whole is bounded by an iteration cap and the task's soft
//! timeout.

use crate::llm::{
    normalize_reasoning_effort, AssistantMsg, ChatMessage, ChatRequest, LlmClient, LlmError,
    ToolCallRequest, ToolSpec,
};
use crate::safety::{SafetyGate, Verdict};
use crate::tools::{static_precheck, ToolCtx, ToolRegistry};
use ouro_core::{Event, GateDecision, TaskId, TaskOutcome, Usage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Returns true when the budget is exhausted and the next LLM turn must be
/// refused.
pub type BudgetCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Tunables for one loop run.
#[derive(Clone)]
pub struct AgentLoopConfig {
    pub model: String,
    pub reasoning_effort: String,
    pub max_tokens: u32,
    /// Tool-call rounds before the task fails
    pub max_iterations: u32,
    /// Transient-error retries per LLM turn
    pub retry_limit: u32,
    pub soft_timeout: Duration,
    /// Models offered to the `switch_model` tool
    pub available_models: Vec<String>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4.6".to_string(),
            reasoning_effort: "medium".to_string(),
            max_tokens: 16384,
            max_iterations: 40,
            retry_limit: 3,
            soft_timeout: Duration::from_secs(600),
            available_models: Vec::new(),
        }
    }
}

/// One task's reasoning loop. Constructed per task; consumed by [`run`].
///
/// [`run`]: AgentLoop::run
pub struct AgentLoop {
    pub task_id: TaskId,
    pub chat_id: Option<i64>,
    pub instruction: String,
    pub system_prompt: String,
    pub llm: Arc<dyn LlmClient>,
    pub registry: Arc<ToolRegistry>,
    pub gate: SafetyGate,
    pub ctx: ToolCtx,
    pub events: mpsc::UnboundedSender<Event>,
    pub interrupt: Arc<AtomicBool>,
    pub inject_rx: mpsc::UnboundedReceiver<String>,
    pub budget_exhausted: BudgetCheck,
    pub config: AgentLoopConfig,
}

impl AgentLoop {
    /// Drive the loop to a terminal outcome, emitting events along the way.
    pub async fn run(mut self) -> TaskOutcome {
        let started = Instant::now();
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(self.instruction.clone()),
        ];
        // LLM-directed routing; reset by construction when the task ends
        let mut model_override: Option<String> = None;
        let mut effort_override: Option<String> = None;

        for _ in 0..self.config.max_iterations {
            if self.cancelled(started) {
                self.emit(Event::task_cancelled(self.task_id.clone()));
                return TaskOutcome::Cancelled;
            }
            self.drain_injections(&mut messages);

            if (self.budget_exhausted)() {
                self.emit(Event::task_failed(self.task_id.clone(), "budget"));
                return TaskOutcome::Failed { reason: "budget".to_string() };
            }

            let model = model_override.clone().unwrap_or_else(|| self.config.model.clone());
            let effort = normalize_reasoning_effort(
                effort_override.as_deref().unwrap_or(&self.config.reasoning_effort),
                "medium",
            );
            let (reply, usage) = match self.call_llm(&messages, &model, &effort).await {
                Ok(ok) => ok,
                Err(e) => {
                    let reason = format!("llm: {e}");
                    self.emit(Event::task_failed(self.task_id.clone(), reason.clone()));
                    return TaskOutcome::Failed { reason };
                }
            };
            self.emit(Event::llm_usage(self.task_id.clone(), model, usage));

            if reply.tool_calls.is_empty() {
                return self.finish(reply);
            }

            messages.push(ChatMessage::assistant(reply.content.clone(), reply.tool_calls.clone()));
            for call in reply.tool_calls {
                if self.cancelled(started) {
                    self.emit(Event::task_cancelled(self.task_id.clone()));
                    return TaskOutcome::Cancelled;
                }
                let result = self
                    .run_tool(&call, &messages, &mut model_override, &mut effort_override)
                    .await;
                messages.push(ChatMessage::tool_result(call.id.clone(), result));
            }
        }

        self.emit(Event::task_failed(self.task_id.clone(), "max_iterations"));
        TaskOutcome::Failed { reason: "max_iterations".to_string() }
    }

    fn finish(&self, reply: AssistantMsg) -> TaskOutcome {
        if let Some(chat_id) = self.chat_id {
            self.emit(Event::chat_out(self.task_id.clone(), chat_id, reply.content.clone(), false));
        }
        self.emit(Event::task_complete(self.task_id.clone(), reply.content.clone()));
        TaskOutcome::Complete { result: reply.content }
    }

    fn cancelled(&self, started: Instant) -> bool {
        if self.interrupt.load(Ordering::SeqCst) {
            return true;
        }
        if started.elapsed() >= self.config.soft_timeout {
            tracing::warn!(task_id = %self.task_id, "soft timeout reached inside loop");
            self.interrupt.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Pending injections become user messages before the next LLM call,
    /// drained FIFO, one message each.
    fn drain_injections(&mut self, messages: &mut Vec<ChatMessage>) {
        while let Ok(text) = self.inject_rx.try_recv() {
            tracing::debug!(task_id = %self.task_id, "appending injected message");
            messages.push(ChatMessage::user(text));
        }
    }

    async fn call_llm(
        &self,
        messages: &[ChatMessage],
        model: &str,
        effort: &str,
    ) -> Result<(AssistantMsg, Usage), LlmError> {
        let mut tools = self.registry.schemas();
        tools.push(self.switch_model_spec());

        let mut attempt = 0u32;
        loop {
            let request = ChatRequest::new(messages.to_vec(), model)
                .tools(tools.clone())
                .reasoning_effort(effort)
                .max_tokens(self.config.max_tokens);
            match self.llm.chat(request).await {
                Ok(ok) => return Ok(ok),
                Err(e) if e.is_transient() && attempt < self.config.retry_limit => {
                    attempt += 1;
                    let backoff = Duration::from_secs(1 << attempt.min(3));
                    tracing::warn!(task_id = %self.task_id, error = %e, attempt, "transient LLM error, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute one tool call: static pre-check, safety gate, handler with
    /// its declared timeout. Always returns the string to append as the
    /// tool result.
    async fn run_tool(
        &self,
        call: &ToolCallRequest,
        messages: &[ChatMessage],
        model_override: &mut Option<String>,
        effort_override: &mut Option<String>,
    ) -> String {
        if call.name == "switch_model" {
            let result = self.apply_switch_model(&call.arguments, model_override, effort_override);
            self.emit(Event::tool_call(
                self.task_id.clone(),
                call.name.clone(),
                call.arguments.clone(),
                GateDecision::Unchecked,
                result.len(),
            ));
            return result;
        }

        if let Some(violation) = static_precheck(&call.name, &call.arguments) {
            self.emit(Event::tool_call(
                self.task_id.clone(),
                call.name.clone(),
                call.arguments.clone(),
                GateDecision::Blocked,
                violation.len(),
            ));
            return violation;
        }

        let mut decision = GateDecision::Unchecked;
        let mut warning = None;
        if self.registry.is_checked(&call.name) {
            eprintln!("DEBUG: before gate.check");
            let check = self.gate.check(&call.name, &call.arguments, messages).await;
            eprintln!("DEBUG: after gate.check, verdict={:?}", check.verdict);
            for (model, usage) in check.usages {
                self.emit(Event::llm_usage(self.task_id.clone(), model, usage));
            }
            match check.verdict {
                Verdict::Allow => decision = GateDecision::Allowed,
                Verdict::AllowWithWarning(w) => {
                    decision = GateDecision::Warned;
                    warning = Some(w);
                }
                Verdict::Block(violation) => {
                    self.emit(Event::tool_call(
                        self.task_id.clone(),
                        call.name.clone(),
                        call.arguments.clone(),
                        GateDecision::Blocked,
                        violation.len(),
                    ));
                    return violation;
                }
            }
        }

        eprintln!("DEBUG: before execute_with_timeout");
        let result = self.execute_with_timeout(&call.name, call.arguments.clone()).await;
        eprintln!("DEBUG: after execute_with_timeout");
        let result = match warning {
            Some(w) => format!("{w}\n\n---\n{result}"),
            None => result,
        };
        self.emit(Event::tool_call(
            self.task_id.clone(),
            call.name.clone(),
            call.arguments.clone(),
            decision,
            result.len(),
        ));
        result
    }

    async fn execute_with_timeout(&self, name: &str, args: Value) -> String {
        let timeout = self.registry.timeout_of(name);
        let registry = Arc::clone(&self.registry);
        let ctx = self.ctx.clone();
        let tool = name.to_string();

        let handle =
            tokio::task::spawn_blocking(move || registry.execute(&tool, &ctx, args));
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => format!("⚠️ TOOL_ERROR ({name}): {e}"),
            Ok(Err(join)) => format!("⚠️ TOOL_ERROR ({name}): {join}"),
            Err(_) => {
                format!("⚠️ TOOL_ERROR ({name}): tool timed out after {}s", timeout.as_secs())
            }
        }
    }

    fn apply_switch_model(
        &self,
        args: &Value,
        model_override: &mut Option<String>,
        effort_override: &mut Option<String>,
    ) -> String {
        let requested_model = args.get("model").and_then(Value::as_str);
        let requested_effort = args.get("reasoning_effort").and_then(Value::as_str);

        if let Some(model) = requested_model {
            if !self.config.available_models.iter().any(|m| m == model) {
                return format!(
                    "⚠️ Unknown model: {model}. Available: {}",
                    self.config.available_models.join(", ")
                );
            }
            *model_override = Some(model.to_string());
        }
        if let Some(effort) = requested_effort {
            *effort_override = Some(normalize_reasoning_effort(effort, "medium"));
        }
        format!(
            "Model routing updated: model={}, effort={}",
            model_override.as_deref().unwrap_or(&self.config.model),
            effort_override.as_deref().unwrap_or(&self.config.reasoning_effort),
        )
    }

    fn switch_model_spec(&self) -> ToolSpec {
        ToolSpec {
            name: "switch_model".to_string(),
            description: "Switch the model and/or reasoning effort used for the rest of this task."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string", "enum": self.config.available_models },
                    "reasoning_effort": {
                        "type": "string",
                        "enum": ["none", "minimal", "low", "medium", "high", "xhigh"]
                    }
                }
            }),
        }
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::warn!(task_id = %self.task_id, "event channel closed");
        }
    }
}

#[cfg(test)]
#[path = "agent_loop_tests.rs"]
mod tests;
