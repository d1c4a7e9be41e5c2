// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tuning_defaults() {
    let tuning = DelayTuning::from_params(&PluginConfig::new("redis-delay"));
    assert_eq!(tuning, DelayTuning::default());
    assert_eq!(tuning.busy_sleep, Duration::from_millis(100));
    assert_eq!(tuning.idle_sleep, Duration::from_secs(1));
    assert_eq!(tuning.repush_delay, 0);
}

#[test]
fn tuning_reads_params() {
    let plugin = PluginConfig::new("redis-delay")
        .with_param("busy_sleep_ms", 50)
        .with_param("idle_sleep_ms", 5000)
        .with_param("repush_delay", 30);
    let tuning = DelayTuning::from_params(&plugin);
    assert_eq!(tuning.busy_sleep, Duration::from_millis(50));
    assert_eq!(tuning.idle_sleep, Duration::from_secs(5));
    assert_eq!(tuning.repush_delay, 30);
}

#[yare::parameterized(
    backlog_is_busy        = { 2, None,                             100 },
    backlog_ignores_next   = { 2, Some(Duration::from_millis(900)), 100 },
    nothing_due_is_idle    = { 0, None,                             1000 },
    single_item_no_next    = { 1, None,                             1000 },
    next_due_soon          = { 0, Some(Duration::from_millis(400)), 400 },
    next_due_now_clamped   = { 1, Some(Duration::ZERO),             100 },
    next_due_late_clamped  = { 0, Some(Duration::from_secs(5)),     1000 },
)]
fn adaptive_sleep(ready: usize, next_due_in: Option<Duration>, expected_ms: u64) {
    let tuning = DelayTuning::default();
    assert_eq!(
        tuning.next_sleep(ready, next_due_in),
        Duration::from_millis(expected_ms)
    );
}
