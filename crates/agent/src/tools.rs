// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool registry contract.
//!
//! Tools are plain records; the registry is built once per task by the host.
//! The context handed to handlers is a small immutable value — anything a
//! tool wants to feed back (usage, progress) goes through the loop's event
//! channel, not through the context.

use crate::llm::ToolSpec;
use indexmap::IndexMap;
use ouro_core::TaskId;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Tools that must pass the safety gate before execution.
pub const CHECKED_TOOLS: [&str; 5] =
    ["run_shell", "code_edit", "repo_write_commit", "repo_commit", "data_write"];

/// Files the static pre-check refuses to let any tool touch destructively.
const PROTECTED_FILES: [&str; 2] = ["bible.md", "safety."];

/// Verbs that mark an argument as destructive in the static pre-check.
const DELETE_VERBS: [&str; 3] = ["rm ", "delete", "trash"];

/// Per-task handles available to every tool handler.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    pub repo_dir: PathBuf,
    pub data_dir: PathBuf,
    pub task_id: TaskId,
    pub task_depth: u32,
    pub chat_id: Option<i64>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}. Available: {available}")]
    Unknown { name: String, available: String },

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArgs { tool: String, message: String },

    #[error("{0}")]
    Execution(String),

    #[error("tool timed out after {0}s")]
    Timeout(u64),
}

type Handler = Box<dyn Fn(&ToolCtx, Value) -> Result<String, ToolError> + Send + Sync>;

/// Single tool descriptor: name, schema, handler, metadata.
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub handler: Handler,
    pub timeout: Duration,
    pub is_code_tool: bool,
}

impl ToolEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: impl Fn(&ToolCtx, Value) -> Result<String, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Box::new(handler),
            timeout: Duration::from_secs(120),
            is_code_tool: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn code_tool(mut self) -> Self {
        self.is_code_tool = true;
        self
    }
}

/// Registry of the tools offered to one task's agent loop.
#[derive(Default)]
pub struct ToolRegistry {
    entries: IndexMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: ToolEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Function schemas for the LLM request.
    pub fn schemas(&self) -> Vec<ToolSpec> {
        self.entries
            .values()
            .map(|e| ToolSpec {
                name: e.name.clone(),
                description: e.description.clone(),
                parameters: e.parameters.clone(),
            })
            .collect()
    }

    /// Declared timeout for a tool; unknown tools get the default.
    pub fn timeout_of(&self, name: &str) -> Duration {
        self.entries.get(name).map_or(Duration::from_secs(120), |e| e.timeout)
    }

    /// Whether the tool must pass the safety gate.
    pub fn is_checked(&self, name: &str) -> bool {
        CHECKED_TOOLS.contains(&name)
    }

    /// Run the named tool's handler. Timeouts are enforced by the loop,
    /// which knows the declared budget.
    pub fn execute(&self, name: &str, ctx: &ToolCtx, args: Value) -> Result<String, ToolError> {
        let entry = self.entries.get(name).ok_or_else(|| ToolError::Unknown {
            name: name.to_string(),
            available: self.names().join(", "),
        })?;
        (entry.handler)(ctx, args)
    }
}

/// Hardcoded sandbox protection, checked before any LLM-based gate.
///
/// Blocks arguments that both mention an identity/safety file and carry a
/// delete verb. Returns the violation string to place in the tool result.
pub fn static_precheck(tool: &str, args: &Value) -> Option<String> {
    if !CHECKED_TOOLS.contains(&tool) {
        return None;
    }
    let text = args.to_string().to_lowercase();
    let mentions_protected = PROTECTED_FILES.iter().any(|f| text.contains(f));
    let destructive = DELETE_VERBS.iter().any(|v| text.contains(v));
    if mentions_protected && destructive {
        return Some(
            "⚠️ CRITICAL SAFETY_VIOLATION: Hardcoded sandbox prevents deletion or modification \
             of the identity and safety files."
                .to_string(),
        );
    }
    None
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
