// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resident chat agent.
//!
//! Exactly one agent loop serves the owner's conversation, kept in the
//! supervisor process for low latency. While it is busy, new inbound text is
//! injected into the ongoing conversation instead of starting a second loop.

use crate::prompts;
use crate::tools_builtin;
use ouro_agent::{AgentLoop, AgentLoopConfig, BudgetCheck, LlmClient, SafetyGate, ToolCtx};
use ouro_core::{Event, Settings, SystemClock, Task, TaskType};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How an inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatHandled {
    /// A fresh loop run started
    Started,
    /// Appended to the ongoing conversation
    Injected,
}

pub struct ChatAgent {
    llm: Arc<dyn LlmClient>,
    settings: Settings,
    data_dir: PathBuf,
    repo_dir: PathBuf,
    event_tx: mpsc::UnboundedSender<Event>,
    budget_exhausted: BudgetCheck,
    busy: Arc<AtomicBool>,
    inject_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ChatAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        settings: Settings,
        data_dir: PathBuf,
        repo_dir: PathBuf,
        event_tx: mpsc::UnboundedSender<Event>,
        budget_exhausted: BudgetCheck,
    ) -> Self {
        Self {
            llm,
            settings,
            data_dir,
            repo_dir,
            event_tx,
            budget_exhausted,
            busy: Arc::new(AtomicBool::new(false)),
            inject_tx: Mutex::new(None),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Route one inbound message: inject while busy, otherwise start a run.
    pub fn handle_message(&self, chat_id: i64, text: String) -> ChatHandled {
        if self.is_busy() {
            if let Some(tx) = self.inject_tx.lock().as_ref() {
                if tx.send(text.clone()).is_ok() {
                    tracing::debug!("injected message into busy chat agent");
                    return ChatHandled::Injected;
                }
            }
            // Injection channel gone means the loop is finishing; fall
            // through and start fresh
        }

        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        *self.inject_tx.lock() = Some(inject_tx);
        self.busy.store(true, Ordering::SeqCst);

        let agent_loop = self.build_loop(chat_id, text, inject_rx);
        let busy = Arc::clone(&self.busy);
        tokio::spawn(async move {
            let outcome = agent_loop.run().await;
            tracing::debug!(outcome = %outcome, "chat agent turn finished");
            busy.store(false, Ordering::SeqCst);
        });
        ChatHandled::Started
    }

    fn build_loop(
        &self,
        chat_id: i64,
        text: String,
        inject_rx: mpsc::UnboundedReceiver<String>,
    ) -> AgentLoop {
        let task = Task::new(
            TaskType::UserRequest,
            text,
            self.settings.soft_timeout_secs,
            self.settings.hard_timeout_secs,
            &SystemClock,
        )
        .chat_id(chat_id);

        AgentLoop {
            task_id: task.id.clone(),
            chat_id: Some(chat_id),
            instruction: task.instruction.clone(),
            system_prompt: prompts::chat_system_prompt(),
            llm: Arc::clone(&self.llm),
            registry: Arc::new(tools_builtin::build_registry(self.event_tx.clone(), &task)),
            gate: SafetyGate::new(
                Arc::clone(&self.llm),
                self.settings.model_light.clone(),
                self.settings.model_code.clone(),
            ),
            ctx: ToolCtx {
                repo_dir: self.repo_dir.clone(),
                data_dir: self.data_dir.clone(),
                task_id: task.id.clone(),
                task_depth: 0,
                chat_id: Some(chat_id),
            },
            events: self.event_tx.clone(),
            interrupt: Arc::new(AtomicBool::new(false)),
            inject_rx,
            budget_exhausted: Arc::clone(&self.budget_exhausted),
            config: AgentLoopConfig {
                model: self.settings.model_main.clone(),
                soft_timeout: Duration::from_secs(self.settings.soft_timeout_secs),
                available_models: self.settings.available_models(),
                ..AgentLoopConfig::default()
            },
        }
    }
}

#[cfg(test)]
#[path = "chat_agent_tests.rs"]
mod tests;
