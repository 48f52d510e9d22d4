// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background consciousness: the self-initiated task driver.
//!
//! When enabled it wakes on an exponentially-growing interval and enqueues
//! one lowest-priority reflect task per wake. Chat activity pauses it; chat
//! completion resumes it.

use ouro_core::{Clock, Settings, Task, TaskType};

pub struct Consciousness<C: Clock> {
    clock: C,
    enabled: bool,
    paused: bool,
    /// Current wake interval, doubling to the max
    interval_secs: u64,
    min_secs: u64,
    max_secs: u64,
    max_rounds: u32,
    next_wake_ms: Option<u64>,
    /// Observations fed into the next reflection prompt
    observations: Vec<String>,
}

impl<C: Clock> Consciousness<C> {
    pub fn new(settings: &Settings, clock: C) -> Self {
        Self {
            clock,
            enabled: false,
            paused: false,
            interval_secs: settings.bg_wakeup_min_secs,
            min_secs: settings.bg_wakeup_min_secs,
            max_secs: settings.bg_wakeup_max_secs,
            max_rounds: settings.bg_max_rounds,
            next_wake_ms: None,
            observations: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.enabled
    }

    pub fn start(&mut self) -> &'static str {
        if self.enabled {
            return "Background consciousness already running.";
        }
        self.enabled = true;
        self.interval_secs = self.min_secs;
        self.schedule_next();
        "Background consciousness started."
    }

    pub fn stop(&mut self) -> &'static str {
        if !self.enabled {
            return "Background consciousness already stopped.";
        }
        self.enabled = false;
        self.next_wake_ms = None;
        "Background consciousness stopped."
    }

    pub fn status_line(&self) -> String {
        let state = if !self.enabled {
            "stopped"
        } else if self.paused {
            "paused"
        } else {
            "running"
        };
        format!("Background consciousness: {state}")
    }

    /// Chat activity pauses reflection until [`resume`] is called.
    ///
    /// [`resume`]: Consciousness::resume
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Feed context into the next reflection round.
    pub fn inject_observation(&mut self, text: impl Into<String>) {
        self.observations.push(text.into());
        // Keep the tail; old observations lose relevance
        if self.observations.len() > 20 {
            self.observations.remove(0);
        }
    }

    /// Called once per supervisor tick. Returns a reflect task when a wake
    /// is due; backs the interval off exponentially.
    pub fn tick(&mut self, settings: &Settings) -> Option<Task> {
        if !self.enabled || self.paused {
            return None;
        }
        let now_ms = self.clock.epoch_ms();
        let due = match self.next_wake_ms {
            Some(at) => now_ms >= at,
            None => false,
        };
        if !due {
            return None;
        }

        self.interval_secs = (self.interval_secs * 2).min(self.max_secs);
        self.schedule_next();

        let mut instruction = format!(
            "Background reflection round (max {} LLM rounds): review what has happened \
             recently and decide whether anything small and useful is worth doing.",
            self.max_rounds
        );
        if !self.observations.is_empty() {
            instruction.push_str("\n\nRecent observations:\n");
            for obs in self.observations.drain(..) {
                instruction.push_str(&format!("- {obs}\n"));
            }
        }

        Some(Task::new(
            TaskType::Consciousness,
            instruction,
            settings.soft_timeout_secs,
            settings.hard_timeout_secs,
            &self.clock,
        ))
    }

    fn schedule_next(&mut self) {
        self.next_wake_ms = Some(self.clock.epoch_ms() + self.interval_secs * 1000);
    }
}

#[cfg(test)]
#[path = "consciousness_tests.rs"]
mod tests;
