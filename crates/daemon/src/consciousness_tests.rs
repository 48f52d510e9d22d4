// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ouro_core::FakeClock;
use std::time::Duration;

fn settings() -> Settings {
    let mut s = Settings::default();
    s.bg_wakeup_min_secs = 30;
    s.bg_wakeup_max_secs = 120;
    s
}

fn consciousness() -> (Consciousness<FakeClock>, FakeClock, Settings) {
    let clock = FakeClock::new();
    let s = settings();
    (Consciousness::new(&s, clock.clone()), clock, s)
}

#[test]
fn disabled_never_wakes() {
    let (mut c, clock, s) = consciousness();
    clock.advance(Duration::from_secs(10_000));
    assert!(c.tick(&s).is_none());
}

#[test]
fn wakes_after_min_interval_with_lowest_priority() {
    let (mut c, clock, s) = consciousness();
    c.start();
    assert!(c.tick(&s).is_none());

    clock.advance(Duration::from_secs(31));
    let task = c.tick(&s).unwrap();
    assert_eq!(task.task_type, TaskType::Consciousness);
    assert_eq!(task.priority, 1);
}

#[test]
fn interval_doubles_and_caps() {
    let (mut c, clock, s) = consciousness();
    c.start();

    // First wake at 30s, then 60s, then 120s, capped at 120s
    let mut wakes = 0;
    for _ in 0..20 {
        clock.advance(Duration::from_secs(30));
        if c.tick(&s).is_some() {
            wakes += 1;
        }
    }
    // 600s total: wakes at 30, 90 (+60), 210 (+120), 330, 450, 570
    assert_eq!(wakes, 6);
}

#[test]
fn pause_suppresses_wakes_resume_restores() {
    let (mut c, clock, s) = consciousness();
    c.start();
    c.pause();
    clock.advance(Duration::from_secs(1000));
    assert!(c.tick(&s).is_none());

    c.resume();
    assert!(c.tick(&s).is_some());
}

#[test]
fn observations_drain_into_the_prompt() {
    let (mut c, clock, s) = consciousness();
    c.start();
    c.inject_observation("Owner message: hello");

    clock.advance(Duration::from_secs(31));
    let task = c.tick(&s).unwrap();
    assert!(task.instruction.contains("Owner message: hello"));

    // Drained: the next wake has no stale observations
    clock.advance(Duration::from_secs(61));
    let next = c.tick(&s).unwrap();
    assert!(!next.instruction.contains("Owner message"));
}

#[test]
fn stop_clears_schedule() {
    let (mut c, clock, s) = consciousness();
    c.start();
    c.stop();
    clock.advance(Duration::from_secs(1000));
    assert!(c.tick(&s).is_none());
    assert_eq!(c.status_line(), "Background consciousness: stopped");
}

#[test]
fn start_twice_reports_already_running() {
    let (mut c, _, _) = consciousness();
    assert_eq!(c.start(), "Background consciousness started.");
    assert_eq!(c.start(), "Background consciousness already running.");
}
