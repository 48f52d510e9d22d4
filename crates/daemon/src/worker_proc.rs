// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker process (`ourod worker`).
//!
//! Protocol: the supervisor writes [`WorkerCommand`] JSON lines on stdin;
//! the worker writes [`Event`] JSON lines on stdout. Heartbeats are regular
//! events. The process exits when stdin closes or on `Shutdown`.

use crate::pool::HEARTBEAT_INTERVAL;
use crate::prompts;
use crate::tools_builtin;
use ouro_agent::{AgentLoop, AgentLoopConfig, LlmClient, OpenRouterClient, SafetyGate, ToolCtx};
use ouro_core::{Event, Settings, Task, TaskId, TaskType, WorkerId};
use ouro_store::{SettingsStore, StateStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Lines the supervisor writes to a worker's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Assign { task: Task },
    Interrupt { task_id: TaskId },
    Shutdown,
}

/// The task currently running in this worker, if any.
type CurrentTask = Arc<Mutex<Option<(TaskId, Arc<AtomicBool>)>>>;

/// Entry point for the worker subcommand. Returns when stdin closes.
pub async fn run_worker(worker_id: WorkerId, data_dir: PathBuf, repo_dir: PathBuf) {
    let settings = SettingsStore::new(&data_dir).load();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    spawn_stdout_writer(event_rx);
    let _ = event_tx.send(Event::worker_started(worker_id.clone()));
    spawn_heartbeat(worker_id.clone(), event_tx.clone());

    let llm: Arc<dyn LlmClient> = match OpenRouterClient::new(settings.api_key.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "cannot build LLM client");
            return;
        }
    };

    let current: CurrentTask = Arc::new(Mutex::new(None));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match serde_json::from_str::<WorkerCommand>(&line) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, line, "unparseable worker command");
                continue;
            }
        };
        match command {
            WorkerCommand::Assign { task } => {
                if current.lock().is_some() {
                    tracing::warn!(task_id = %task.id, "assignment while busy, refusing");
                    let _ = event_tx
                        .send(Event::task_failed(task.id.clone(), "worker busy"));
                    continue;
                }
                let interrupt = Arc::new(AtomicBool::new(false));
                *current.lock() = Some((task.id.clone(), Arc::clone(&interrupt)));

                let done = Arc::clone(&current);
                let agent_loop = build_loop(
                    &task,
                    &settings,
                    &data_dir,
                    &repo_dir,
                    Arc::clone(&llm),
                    event_tx.clone(),
                    interrupt,
                );
                tokio::spawn(async move {
                    let outcome = agent_loop.run().await;
                    tracing::info!(outcome = %outcome, "task finished");
                    *done.lock() = None;
                });
            }
            WorkerCommand::Interrupt { task_id } => {
                let guard = current.lock();
                match guard.as_ref() {
                    Some((id, flag)) if *id == task_id => flag.store(true, Ordering::SeqCst),
                    _ => tracing::debug!(task_id = %task_id, "interrupt for task not running here"),
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    tracing::info!(worker_id = %worker_id, "worker exiting");
}

/// Build the loop for one assignment.
fn build_loop(
    task: &Task,
    settings: &Settings,
    data_dir: &PathBuf,
    repo_dir: &PathBuf,
    llm: Arc<dyn LlmClient>,
    event_tx: mpsc::UnboundedSender<Event>,
    interrupt: Arc<AtomicBool>,
) -> AgentLoop {
    // Code-heavy task types route to the code model
    let model = match task.task_type {
        TaskType::Evolution | TaskType::Review => settings.model_code.clone(),
        _ => settings.model_main.clone(),
    };

    let store = StateStore::new(data_dir, ouro_core::PriceTable::default(), settings.total_budget_usd);
    let limit = settings.total_budget_usd;
    let budget_exhausted = Arc::new(move || limit > 0.0 && store.load().spent_usd >= limit);

    let registry = tools_builtin::build_registry(event_tx.clone(), task);
    let (_, inject_rx) = mpsc::unbounded_channel();

    AgentLoop {
        task_id: task.id.clone(),
        chat_id: task.chat_id,
        instruction: task.instruction.clone(),
        system_prompt: prompts::system_prompt(task.task_type),
        llm: Arc::clone(&llm),
        registry: Arc::new(registry),
        gate: SafetyGate::new(llm, settings.model_light.clone(), settings.model_code.clone()),
        ctx: ToolCtx {
            repo_dir: repo_dir.clone(),
            data_dir: data_dir.clone(),
            task_id: task.id.clone(),
            task_depth: task.depth,
            chat_id: task.chat_id,
        },
        events: event_tx,
        interrupt,
        inject_rx,
        budget_exhausted,
        config: AgentLoopConfig {
            model,
            reasoning_effort: "medium".to_string(),
            soft_timeout: Duration::from_secs(task.soft_timeout_secs),
            available_models: settings.available_models(),
            ..AgentLoopConfig::default()
        },
    }
}

/// Forward loop events to stdout as JSON lines.
fn spawn_stdout_writer(mut event_rx: mpsc::UnboundedReceiver<Event>) {
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = event_rx.recv().await {
            let mut line = match serde_json::to_vec(&event) {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = %e, "unserializable event");
                    continue;
                }
            };
            line.push(b'\n');
            if stdout.write_all(&line).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });
}

fn spawn_heartbeat(worker_id: WorkerId, event_tx: mpsc::UnboundedSender<Event>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            if event_tx.send(Event::heartbeat(worker_id.clone())).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_command_round_trips() {
        let cmd = WorkerCommand::Assign { task: Task::builder().build() };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"assign\""));
        let back: WorkerCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn interrupt_carries_task_id() {
        let cmd = WorkerCommand::Interrupt { task_id: TaskId::from_string("task-9") };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "interrupt");
        assert_eq!(json["task_id"], "task-9");
    }
}
