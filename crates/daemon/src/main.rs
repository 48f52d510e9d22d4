// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ourod: the Ouroboros supervisor daemon.
//!
//! Runs the supervisor by default; `ourod worker` is the entry point the
//! pool spawns for isolated task execution. A restart request exits with
//! code 42, which the external launcher treats as "re-spawn me".

use clap::{Parser, Subcommand};
use ouro_agent::OpenRouterClient;
use ouro_core::WorkerId;
use ouro_daemon::supervisor::ExitIntent;
use ouro_daemon::{DaemonConfig, MessageBus, Supervisor, RESTART_EXIT_CODE};
use ouro_store::SettingsStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ourod", about = "Ouroboros agent supervisor")]
struct Cli {
    /// Data directory (settings, state, logs). Defaults to the platform
    /// data dir.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Repository working tree. Defaults next to the data dir.
    #[arg(long)]
    repo_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a pool worker (spawned by the supervisor, not by hand)
    Worker {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        repo_dir: PathBuf,
        #[arg(long)]
        worker_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(async move {
        match cli.command {
            Some(Command::Worker { data_dir, repo_dir, worker_id }) => {
                // Workers log to stderr; stdout is the event protocol
                tracing_subscriber::fmt()
                    .with_env_filter(
                        EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| EnvFilter::new("info")),
                    )
                    .with_writer(std::io::stderr)
                    .init();
                ouro_daemon::worker_proc::run_worker(
                    WorkerId::from_string(worker_id),
                    data_dir,
                    repo_dir,
                )
                .await;
                0
            }
            None => run_daemon(cli.data_dir, cli.repo_dir).await,
        }
    });
    std::process::exit(exit_code);
}

async fn run_daemon(data_dir: Option<PathBuf>, repo_dir: Option<PathBuf>) -> i32 {
    let mut config = DaemonConfig::default_paths();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = repo_dir {
        config.repo_dir = dir;
    }

    if let Err(e) = std::fs::create_dir_all(config.logs_dir()) {
        eprintln!("cannot create {}: {e}", config.logs_dir().display());
        return 1;
    }
    let file_appender = tracing_appender::rolling::daily(config.logs_dir(), "daemon.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let settings = SettingsStore::new(&config.data_dir).load();
    if settings.api_key.is_empty() {
        tracing::error!("no API key configured; set it in settings.json and restart");
        eprintln!("No API key configured. Add one to settings.json and restart.");
        return 1;
    }

    let llm: Arc<dyn ouro_agent::LlmClient> =
        match OpenRouterClient::new(settings.api_key.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "failed to build LLM client");
                return 1;
            }
        };

    let mut supervisor =
        match Supervisor::bootstrap(config, settings, MessageBus::new(), llm).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "supervisor bootstrap failed");
                eprintln!("Supervisor failed to start: {e}");
                return 1;
            }
        };

    tracing::info!("supervisor running");
    match supervisor.run().await {
        ExitIntent::Restart => {
            tracing::info!("exiting with restart code {RESTART_EXIT_CODE}");
            RESTART_EXIT_CODE
        }
        ExitIntent::Halted => 1,
    }
}
