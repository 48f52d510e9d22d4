// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool: isolated child processes running agent loops.
//!
//! Each worker is a separate OS process (`ourod worker`) so a crashing loop
//! cannot take down the supervisor and memory cannot leak between tasks.
//! Assignments go to the child as JSON lines on stdin; the child emits
//! events as JSON lines on stdout, which a per-worker reader task forwards
//! into the shared event channel.

use crate::worker_proc::WorkerCommand;
use ouro_core::{Event, Task, TaskId, WorkerId};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Rolling crash ceiling: this many worker deaths within the window halts
/// the pool.
pub const MAX_CRASHES_IN_WINDOW: u32 = 3;
pub const CRASH_WINDOW: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_workers: u32,
    pub data_dir: PathBuf,
    pub repo_dir: PathBuf,
    /// Binary to spawn with the `worker` subcommand (normally current_exe)
    pub worker_program: PathBuf,
}

/// One spawned worker process.
struct WorkerHandle {
    child: Child,
    stdin: ChildStdin,
    last_heartbeat: Instant,
    assigned: Option<TaskId>,
}

/// A worker reaped by the health check, with the task it was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedWorker {
    pub worker_id: WorkerId,
    pub task_id: Option<TaskId>,
    pub reason: &'static str,
}

/// Rolling window of crash timestamps.
#[derive(Debug)]
pub struct CrashWindow {
    times: VecDeque<Instant>,
    window: Duration,
    max: u32,
}

impl CrashWindow {
    pub fn new(window: Duration, max: u32) -> Self {
        Self { times: VecDeque::new(), window, max }
    }

    /// Record a crash; returns true when the ceiling is now exceeded.
    pub fn record(&mut self, now: Instant) -> bool {
        self.times.push_back(now);
        self.prune(now);
        self.times.len() as u32 > self.max
    }

    pub fn count(&mut self, now: Instant) -> u32 {
        self.prune(now);
        self.times.len() as u32
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.times.front() {
            if now.duration_since(*front) > self.window {
                self.times.pop_front();
            } else {
                break;
            }
        }
    }
}

/// The supervisor's pool of worker processes.
pub struct WorkerPool {
    config: PoolConfig,
    workers: HashMap<WorkerId, WorkerHandle>,
    crashes: CrashWindow,
    halted: bool,
    event_tx: mpsc::UnboundedSender<Event>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, event_tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            config,
            workers: HashMap::new(),
            crashes: CrashWindow::new(CRASH_WINDOW, MAX_CRASHES_IN_WINDOW),
            halted: false,
            event_tx,
        }
    }

    /// Pool halted by the crash ceiling; surfaced in `/status`.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn total(&self) -> usize {
        self.workers.len()
    }

    pub fn alive(&mut self) -> usize {
        let mut count = 0;
        for w in self.workers.values_mut() {
            if matches!(w.child.try_wait(), Ok(None)) {
                count += 1;
            }
        }
        count
    }

    pub fn idle_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|(_, w)| w.assigned.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Start `n` worker processes.
    pub async fn spawn(&mut self, n: u32) {
        for _ in 0..n {
            if self.workers.len() as u32 >= self.config.max_workers {
                break;
            }
            match self.spawn_one().await {
                Ok(worker_id) => {
                    tracing::info!(worker_id = %worker_id, "worker spawned");
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn worker");
                }
            }
        }
    }

    async fn spawn_one(&mut self) -> std::io::Result<WorkerId> {
        let worker_id = WorkerId::new();
        let mut cmd = Command::new(&self.config.worker_program);
        cmd.arg("worker")
            .arg("--data-dir")
            .arg(&self.config.data_dir)
            .arg("--repo-dir")
            .arg(&self.config.repo_dir)
            .arg("--worker-id")
            .arg(worker_id.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::other("worker stdin not piped")
        })?;

        if let Some(stdout) = child.stdout.take() {
            spawn_event_reader(worker_id.clone(), stdout, self.event_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_logger(worker_id.clone(), stderr);
        }

        self.workers.insert(
            worker_id.clone(),
            WorkerHandle { child, stdin, last_heartbeat: Instant::now(), assigned: None },
        );
        Ok(worker_id)
    }

    /// Record a heartbeat (or any sign of life) from a worker.
    pub fn record_heartbeat(&mut self, worker_id: &WorkerId) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.last_heartbeat = Instant::now();
        }
    }

    /// Mark the worker that ran `task_id` idle again.
    pub fn mark_idle_by_task(&mut self, task_id: &TaskId) -> Option<WorkerId> {
        for (id, worker) in self.workers.iter_mut() {
            if worker.assigned.as_ref() == Some(task_id) {
                worker.assigned = None;
                return Some(id.clone());
            }
        }
        None
    }

    /// Assign pending tasks to idle workers. Returns tasks dropped for
    /// exceeding the depth ceiling, for event emission.
    pub async fn assign(
        &mut self,
        queue: &mut crate::queue::TaskQueue<impl ouro_core::Clock>,
    ) -> Vec<Task> {
        if self.halted {
            return Vec::new();
        }
        let idle = self.idle_workers();
        if idle.is_empty() {
            return Vec::new();
        }
        let (tasks, dropped) = queue.take_assignable(idle.len());
        for (worker_id, task) in idle.into_iter().zip(tasks) {
            match self.send_command(&worker_id, &WorkerCommand::Assign { task: task.clone() }).await
            {
                Ok(()) => {
                    if let Some(worker) = self.workers.get_mut(&worker_id) {
                        worker.assigned = Some(task.id.clone());
                    }
                    tracing::info!(worker_id = %worker_id, task_id = %task.id, "task assigned");
                    queue.mark_running(task, worker_id);
                }
                Err(e) => {
                    tracing::error!(worker_id = %worker_id, error = %e, "assignment write failed, requeueing");
                    queue.enqueue(task);
                }
            }
        }
        dropped
    }

    /// Ask a worker to cooperatively interrupt its current task.
    pub async fn interrupt(&mut self, worker_id: &WorkerId, task_id: &TaskId) {
        let cmd = WorkerCommand::Interrupt { task_id: task_id.clone() };
        if let Err(e) = self.send_command(worker_id, &cmd).await {
            tracing::warn!(worker_id = %worker_id, error = %e, "interrupt write failed");
        }
    }

    async fn send_command(
        &mut self,
        worker_id: &WorkerId,
        command: &WorkerCommand,
    ) -> std::io::Result<()> {
        let worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| std::io::Error::other("no such worker"))?;
        let mut line = serde_json::to_vec(command)?;
        line.push(b'\n');
        worker.stdin.write_all(&line).await?;
        worker.stdin.flush().await
    }

    /// Reap dead or heartbeat-stale workers; respawn replacements unless the
    /// rolling crash ceiling halts the pool.
    pub async fn ensure_healthy(&mut self) -> Vec<ReapedWorker> {
        let now = Instant::now();
        let stale_after = HEARTBEAT_INTERVAL * 2;

        let mut reaped = Vec::new();
        let dead_ids: Vec<(WorkerId, &'static str)> = self
            .workers
            .iter_mut()
            .filter_map(|(id, w)| match w.child.try_wait() {
                Ok(Some(_)) => Some((id.clone(), "process exited")),
                Ok(None) if now.duration_since(w.last_heartbeat) > stale_after => {
                    Some((id.clone(), "heartbeat stale"))
                }
                Err(_) => Some((id.clone(), "unreachable")),
                _ => None,
            })
            .collect();

        for (worker_id, reason) in dead_ids {
            if let Some(mut worker) = self.workers.remove(&worker_id) {
                let _ = worker.child.start_kill();
                tracing::warn!(worker_id = %worker_id, reason, "reaping worker");
                reaped.push(ReapedWorker {
                    worker_id,
                    task_id: worker.assigned.take(),
                    reason,
                });
                if self.crashes.record(now) {
                    tracing::error!("worker crash ceiling exceeded, halting pool");
                    self.halted = true;
                }
            }
        }

        if !self.halted {
            let missing = self.config.max_workers.saturating_sub(self.workers.len() as u32);
            if missing > 0 && !reaped.is_empty() {
                self.spawn(missing).await;
            }
        }
        reaped
    }

    /// Kill one worker (hard-timeout path). Returns its task, if any.
    pub async fn kill_worker(&mut self, worker_id: &WorkerId) -> Option<TaskId> {
        let mut worker = self.workers.remove(worker_id)?;
        terminate(&mut worker, false).await;
        worker.assigned
    }

    /// Stop every worker. `force` skips the SIGTERM grace period.
    pub async fn kill_all(&mut self, force: bool) {
        let workers: Vec<WorkerId> = self.workers.keys().cloned().collect();
        for worker_id in workers {
            if let Some(mut worker) = self.workers.remove(&worker_id) {
                terminate(&mut worker, force).await;
            }
        }
    }

    pub fn crash_count(&mut self) -> u32 {
        self.crashes.count(Instant::now())
    }
}

/// SIGTERM, bounded grace, then SIGKILL. `force` goes straight to SIGKILL.
async fn terminate(worker: &mut WorkerHandle, force: bool) {
    if !force {
        if let Some(pid) = worker.child.id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
            if tokio::time::timeout(KILL_GRACE, worker.child.wait()).await.is_ok() {
                return;
            }
        }
    }
    let _ = worker.child.start_kill();
    let _ = worker.child.wait().await;
}

fn spawn_event_reader(
    worker_id: WorkerId,
    stdout: tokio::process::ChildStdout,
    event_tx: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(worker_id = %worker_id, error = %e, line, "unparseable worker event");
                }
            }
        }
        tracing::debug!(worker_id = %worker_id, "worker event stream closed");
    });
}

fn spawn_stderr_logger(worker_id: WorkerId, stderr: tokio::process::ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(worker_id = %worker_id, "worker stderr: {line}");
        }
    });
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
