// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `/status` summary.

use ouro_core::{format_elapsed, id::short};

/// Snapshot of supervisor health for the owner.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub uptime_secs: u64,
    pub workers_alive: usize,
    pub workers_total: usize,
    pub pool_halted: bool,
    pub pending: usize,
    pub running: usize,
    pub spent_usd: f64,
    pub budget_limit_usd: f64,
    pub branch: String,
    pub sha: String,
    pub evolution_on: bool,
    pub consciousness: String,
}

impl StatusReport {
    pub fn render(&self) -> String {
        let workers = if self.pool_halted {
            format!(
                "🛑 Workers: HALTED (crash ceiling) — {}/{} alive",
                self.workers_alive, self.workers_total
            )
        } else {
            format!("Workers: {}/{} alive", self.workers_alive, self.workers_total)
        };
        let pct = if self.budget_limit_usd > 0.0 {
            self.spent_usd / self.budget_limit_usd * 100.0
        } else {
            0.0
        };
        format!(
            "Status (up {})\n{workers}\nQueue: {} pending, {} running\n\
             Budget: ${:.4} / ${:.2} ({:.1}%)\nBranch: {}@{}\nEvolution: {}\n{}",
            format_elapsed(self.uptime_secs),
            self.pending,
            self.running,
            self.spent_usd,
            self.budget_limit_usd,
            pct,
            self.branch,
            short(&self.sha, 8),
            if self.evolution_on { "ON" } else { "OFF" },
            self.consciousness,
        )
    }
}
