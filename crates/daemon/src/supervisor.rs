// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor main loop and restart protocol.
//!
//! Single logical thread: all queue and pool mutations happen here, in the
//! strict tick order — event drain before timeout enforcement before
//! assignment — so a task that completes in the same tick it would time out
//! is observed as completed.

use crate::bus::{MessageBus, Update};
use crate::chat_agent::ChatAgent;
use crate::config::DaemonConfig;
use crate::consciousness::Consciousness;
use crate::dispatch::{ControlAction, EventDispatcher};
use crate::pool::{PoolConfig, WorkerPool};
use crate::queue::TaskQueue;
use crate::status::StatusReport;
use ouro_agent::LlmClient;
use ouro_core::{Direction, Event, PriceTable, Settings, SystemClock, TaskId};
use ouro_repo::{RepoManager, UnsyncedPolicy};
use ouro_store::{JsonlLogs, QueueSnapshot, StateStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

/// Exit code that tells the launcher process to re-spawn us.
pub const RESTART_EXIT_CODE: i32 = 42;

/// Consecutive tick crashes before the supervisor halts.
const MAX_CRASH_RETRIES: u32 = 3;

const TICK_SLEEP: Duration = Duration::from_millis(500);
const UPDATE_WAIT: Duration = Duration::from_secs(1);

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    /// Exit with [`RESTART_EXIT_CODE`]; the launcher re-spawns us
    Restart,
    /// Crash ceiling hit; stay down
    Halted,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("git error: {0}")]
    Git(#[from] ouro_repo::GitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Supervisor {
    config: DaemonConfig,
    settings: Settings,
    store: StateStore,
    logs: JsonlLogs,
    repo: RepoManager,
    bus: MessageBus,
    queue: TaskQueue<SystemClock>,
    pool: WorkerPool,
    dispatcher: EventDispatcher,
    consciousness: Consciousness<SystemClock>,
    chat_agent: ChatAgent,
    event_rx: mpsc::UnboundedReceiver<Event>,
    restart_requested: Arc<AtomicBool>,
    update_offset: u64,
    started: Instant,
    /// Owner already told the pool halted
    halt_notified: bool,
}

impl Supervisor {
    /// Wire every component and recover durable state. Mirrors the boot
    /// sequence of the restart protocol: rescue the tree, fresh session id,
    /// restore the pending queue, spawn workers.
    pub async fn bootstrap(
        config: DaemonConfig,
        settings: Settings,
        bus: MessageBus,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, SupervisorError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store =
            StateStore::new(&config.data_dir, PriceTable::default(), settings.total_budget_usd);
        let logs = JsonlLogs::new(&config.data_dir);
        {
            let bus_sink = bus.clone();
            logs.set_sink(Arc::new(move |record| bus_sink.push_log(record)));
        }

        let repo =
            RepoManager::new(&config.repo_dir, &config.branch_dev, &config.branch_stable);
        repo.ensure_repo_present().await?;
        let outcome = repo.safe_restart("bootstrap", UnsyncedPolicy::RescueAndReset).await?;
        if !outcome.ok {
            tracing::error!(message = %outcome.message, "bootstrap safe_restart refused");
        }
        let (branch, sha) = repo.head().await?;

        store.update(|state| {
            state.rotate_session();
            state.current_branch = branch;
            state.current_sha = sha;
        })?;

        let clock = SystemClock;
        let mut queue = TaskQueue::new(QueueSnapshot::new(&config.data_dir), clock.clone());
        let restored = queue.restore();
        queue.persist();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut pool = WorkerPool::new(
            PoolConfig {
                max_workers: settings.max_workers,
                data_dir: config.data_dir.clone(),
                repo_dir: config.repo_dir.clone(),
                worker_program: std::env::current_exe()?,
            },
            event_tx.clone(),
        );
        pool.spawn(settings.max_workers).await;

        let dispatcher =
            EventDispatcher::new(store.clone(), logs.clone(), bus.clone(), settings.clone());
        if restored > 0 {
            if store.load().owner_chat_id.is_some() {
                dispatcher.send_with_budget(
                    dispatcher.owner_chat_id(),
                    &format!("♻️ Restored pending queue from snapshot: {restored} tasks."),
                    false,
                    false,
                );
            }
            tracing::info!(restored, "restored pending tasks from snapshot");
        }

        let budget_store = store.clone();
        let limit = settings.total_budget_usd;
        let chat_agent = ChatAgent::new(
            llm,
            settings.clone(),
            config.data_dir.clone(),
            config.repo_dir.clone(),
            event_tx,
            Arc::new(move || limit > 0.0 && budget_store.load().spent_usd >= limit),
        );

        let consciousness = Consciousness::new(&settings, clock);

        Ok(Self {
            config,
            settings,
            store,
            logs,
            repo,
            bus,
            queue,
            pool,
            dispatcher,
            consciousness,
            chat_agent,
            event_rx,
            restart_requested: Arc::new(AtomicBool::new(false)),
            update_offset: 0,
            started: Instant::now(),
            halt_notified: false,
        })
    }

    /// Shared flag the host reads to exit with the restart code.
    pub fn restart_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.restart_requested)
    }

    /// Drive ticks until a restart is requested or the crash ceiling hits.
    pub async fn run(&mut self) -> ExitIntent {
        let mut crash_streak = 0u32;
        loop {
            if self.restart_requested.load(Ordering::SeqCst) {
                return ExitIntent::Restart;
            }
            match self.tick().await {
                Ok(()) => {
                    crash_streak = 0;
                    tokio::time::sleep(TICK_SLEEP).await;
                }
                Err(e) => {
                    crash_streak += 1;
                    tracing::error!(error = %e, crash_streak, "supervisor tick crashed");
                    self.dispatcher.send_with_budget(
                        self.dispatcher.owner_chat_id(),
                        &format!(
                            "⚠️ Supervisor error (attempt {crash_streak}/{MAX_CRASH_RETRIES}): {e}"
                        ),
                        false,
                        false,
                    );
                    if crash_streak >= MAX_CRASH_RETRIES {
                        self.dispatcher.send_with_budget(
                            self.dispatcher.owner_chat_id(),
                            &format!(
                                "🛑 Supervisor stopped after {MAX_CRASH_RETRIES} crashes. \
                                 Please restart the app."
                            ),
                            false,
                            false,
                        );
                        return ExitIntent::Halted;
                    }
                    let backoff = Duration::from_secs(2u64.pow(crash_streak).min(30));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One supervisor iteration, in the order the system depends on.
    async fn tick(&mut self) -> Result<(), SupervisorError> {
        // 1. Log hygiene
        self.logs.rotate_chat_if_needed()?;

        // 2. Worker health
        let reaped = self.pool.ensure_healthy().await;
        for dead in reaped {
            if let Some(record) = self.queue.finish_by_worker(&dead.worker_id) {
                let event = Event::task_failed(record.task.id.clone(), "worker_died");
                self.dispatcher.dispatch(event, &mut self.queue, &mut self.pool);
            }
        }
        if self.pool.is_halted() && !self.halt_notified {
            self.halt_notified = true;
            self.dispatcher.send_with_budget(
                self.dispatcher.owner_chat_id(),
                "🛑 Worker pool halted: too many crashes in a short window.",
                false,
                true,
            );
        }

        // 3. Event drain (before timeout enforcement, by contract)
        let mut actions = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            actions.extend(self.dispatcher.dispatch(event, &mut self.queue, &mut self.pool));
        }
        for action in actions {
            self.execute_action(action).await;
        }

        // 4. Timeouts
        let timeouts = self.queue.enforce_timeouts();
        for (task_id, worker_id) in timeouts.soft {
            self.dispatcher.send_with_budget(
                self.dispatcher.owner_chat_id(),
                &format!("⚠️ Task {} passed its soft timeout, interrupting.", task_id.short(12)),
                false,
                false,
            );
            self.pool.interrupt(&worker_id, &task_id).await;
        }
        for (task_id, worker_id) in timeouts.hard {
            tracing::warn!(task_id = %task_id, worker_id = %worker_id, "hard timeout, killing worker");
            self.pool.kill_worker(&worker_id).await;
            self.queue.finish(&task_id);
            let event = Event::task_failed(task_id, "hard_timeout");
            self.dispatcher.dispatch(event, &mut self.queue, &mut self.pool);
        }

        // 5. Evolution trigger
        let mut state = self.store.load();
        if self.queue.enqueue_evolution_task_if_needed(&mut state, &self.settings).is_some() {
            self.store.save(&state)?;
        }

        // 6. Consciousness (paused while the chat agent is busy)
        if self.chat_agent.is_busy() {
            self.consciousness.pause();
        } else {
            self.consciousness.resume();
        }
        if let Some(task) = self.consciousness.tick(&self.settings) {
            self.queue.enqueue(task);
        }

        // 7. Assignment
        let dropped = self.pool.assign(&mut self.queue).await;
        for task in dropped {
            let event = Event::task_failed(task.id, "depth_ceiling");
            self.dispatcher.dispatch(event, &mut self.queue, &mut self.pool);
        }

        // 8. Snapshot
        self.queue.persist();

        // 9. User input
        let updates = self.bus.get_updates(self.update_offset, UPDATE_WAIT).await;
        for update in updates {
            self.update_offset = update.update_id + 1;
            self.handle_update(update).await?;
        }

        Ok(())
    }

    async fn execute_action(&mut self, action: ControlAction) {
        match action {
            ControlAction::Restart { reason } => {
                self.do_restart(&reason, false).await;
            }
            ControlAction::Promote { task_id } => match self.repo.promote_to_stable().await {
                Ok(()) => {
                    tracing::info!(task_id = %task_id, "promoted dev to stable");
                    self.dispatcher.send_with_budget(
                        self.dispatcher.owner_chat_id(),
                        "✅ Promoted dev to stable.",
                        false,
                        false,
                    );
                }
                Err(e) => {
                    self.dispatcher.send_with_budget(
                        self.dispatcher.owner_chat_id(),
                        &format!("⚠️ Promotion failed: {e}"),
                        false,
                        false,
                    );
                }
            },
        }
    }

    async fn handle_update(&mut self, update: Update) -> Result<(), SupervisorError> {
        let Update { chat_id, user_id, text, .. } = update;
        self.store.update(|state| {
            state.claim_owner(user_id, chat_id);
            state.last_owner_message_at = Some(ouro_core::utc_iso_now());
        })?;
        self.dispatcher.log_chat(Direction::In, chat_id, &text);

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let lowered = trimmed.to_lowercase();

        if lowered.starts_with("/panic") {
            self.dispatcher.send_with_budget(
                chat_id,
                "🛑 PANIC: stopping everything now.",
                false,
                false,
            );
            self.do_restart("panic", true).await;
        } else if lowered.starts_with("/restart") {
            self.dispatcher.send_with_budget(chat_id, "♻️ Restarting (soft).", false, false);
            self.do_restart("owner_restart", false).await;
        } else if lowered.starts_with("/review") {
            let _ = self.queue.queue_review_task("owner:/review", true, &self.settings);
            self.dispatcher.send_with_budget(chat_id, "🔍 Review queued.", false, false);
        } else if lowered.starts_with("/evolve") {
            let turn_on = !matches!(
                lowered.split_whitespace().nth(1),
                Some("off") | Some("stop") | Some("0")
            );
            self.store.update(|state| state.evolution_mode_enabled = turn_on)?;
            if !turn_on {
                let dropped = self.queue.drop_evolution_tasks();
                if dropped > 0 {
                    tracing::info!(dropped, "dropped queued evolution tasks");
                }
            }
            self.dispatcher.send_with_budget(
                chat_id,
                &format!("🧬 Evolution: {}", if turn_on { "ON" } else { "OFF" }),
                false,
                false,
            );
        } else if lowered.starts_with("/bg") {
            let reply = match lowered.split_whitespace().nth(1) {
                Some("on") | Some("start") | Some("1") => {
                    self.consciousness.start().to_string()
                }
                Some("off") | Some("stop") | Some("0") => self.consciousness.stop().to_string(),
                _ => self.consciousness.status_line(),
            };
            self.dispatcher.send_with_budget(chat_id, &format!("🧠 {reply}"), false, false);
        } else if lowered.starts_with("/status") {
            let report = self.status_report();
            self.dispatcher.send_with_budget(chat_id, &report.render(), false, true);
        } else {
            self.consciousness.inject_observation(format!(
                "Owner message: {}",
                ouro_core::id::short(trimmed, 100)
            ));
            self.consciousness.pause();
            self.chat_agent.handle_message(chat_id, text);
        }
        Ok(())
    }

    /// The restart protocol. Panic skips the dirty-tree handling but still
    /// kills workers, rotates the session, and persists.
    async fn do_restart(&mut self, reason: &str, panic: bool) {
        if !panic {
            match self.repo.safe_restart(reason, UnsyncedPolicy::RescueAndReset).await {
                Ok(outcome) if !outcome.ok => {
                    self.dispatcher.send_with_budget(
                        self.dispatcher.owner_chat_id(),
                        &format!("⚠️ Restart cancelled: {}", outcome.message),
                        false,
                        false,
                    );
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "safe_restart failed, continuing restart");
                }
            }
        }

        self.pool.kill_all(panic).await;

        if panic {
            // Running tasks died with their workers; record them as failed
            let running: Vec<TaskId> =
                self.queue.running().map(|r| r.task.id.clone()).collect();
            for task_id in running {
                let event = Event::task_failed(task_id, "panic");
                self.dispatcher.dispatch(event, &mut self.queue, &mut self.pool);
            }
        } else {
            // Graceful: running tasks go back to pending for auto-resume
            let requeued = self.queue.requeue_running();
            if requeued > 0 {
                tracing::info!(requeued, "requeued running tasks for restart");
            }
        }

        if let Err(e) = self.store.update(|state| state.rotate_session()) {
            tracing::error!(error = %e, "failed to rotate session id");
        }
        self.queue.persist();
        self.restart_requested.store(true, Ordering::SeqCst);
        tracing::info!(reason, panic, "restart requested");
    }

    fn status_report(&mut self) -> StatusReport {
        let state = self.store.load();
        StatusReport {
            uptime_secs: self.started.elapsed().as_secs(),
            workers_alive: self.pool.alive(),
            workers_total: self.pool.total(),
            pool_halted: self.pool.is_halted(),
            pending: self.queue.pending_count(),
            running: self.queue.running_count(),
            spent_usd: state.spent_usd,
            budget_limit_usd: self.settings.total_budget_usd,
            branch: state.current_branch,
            sha: state.current_sha,
            evolution_on: state.evolution_mode_enabled,
            consciousness: self.consciousness.status_line(),
        }
    }

    /// Data directory this supervisor persists under.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }
}
