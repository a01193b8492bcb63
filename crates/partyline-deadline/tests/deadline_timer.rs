//! Integration tests for the turn deadline timer.
//!
//! Every async test runs on a paused clock: `sleep_until` resolves as
//! soon as the runtime has nothing else to do, so time advances
//! deterministically.

use std::time::Duration;

use partyline_deadline::DeadlineTimer;
use tokio::time::{Instant, timeout};

// =========================================================================
// Arming and cancelling
// =========================================================================

#[test]
fn test_new_timer_is_unarmed() {
    let timer = DeadlineTimer::new();
    assert!(!timer.is_armed());
    assert_eq!(timer.armed_turn(), None);
    assert_eq!(timer.deadline(), None);
    assert_eq!(timer.fired_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_arm_sets_turn_and_deadline() {
    let mut timer = DeadlineTimer::new();
    let start = Instant::now();

    let at = timer.arm(3, Duration::from_secs(30));

    assert!(timer.is_armed());
    assert_eq!(timer.armed_turn(), Some(3));
    assert_eq!(timer.deadline(), Some(at));
    assert_eq!(at - start, Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_arm_replaces_previous_deadline() {
    let mut timer = DeadlineTimer::new();
    timer.arm(1, Duration::from_secs(5));

    timer.arm(2, Duration::from_secs(10));

    assert_eq!(timer.armed_turn(), Some(2));
    let expired = timer.wait_for_deadline().await;
    assert_eq!(expired.turn_id, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_disarms() {
    let mut timer = DeadlineTimer::new();
    timer.arm(1, Duration::from_secs(5));

    timer.cancel();

    assert!(!timer.is_armed());
    timer.cancel(); // idempotent
}

// =========================================================================
// has_passed()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_has_passed_tracks_clock() {
    let mut timer = DeadlineTimer::new();
    timer.arm(1, Duration::from_secs(5));

    assert!(!timer.has_passed(Instant::now()));
    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(timer.has_passed(Instant::now()));
}

#[tokio::test(start_paused = true)]
async fn test_has_passed_unarmed_is_false() {
    let timer = DeadlineTimer::new();
    assert!(!timer.has_passed(Instant::now()));
}

// =========================================================================
// wait_for_deadline()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_fires_at_deadline_and_disarms() {
    let mut timer = DeadlineTimer::new();
    let start = Instant::now();
    timer.arm(7, Duration::from_secs(30));

    let expired = timer.wait_for_deadline().await;

    assert_eq!(expired.turn_id, 7);
    assert!(Instant::now() - start >= Duration::from_secs(30));
    assert!(!timer.is_armed());
    assert_eq!(timer.fired_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_unarmed_pends_forever() {
    let mut timer = DeadlineTimer::new();

    let result = timeout(Duration::from_secs(3600), timer.wait_for_deadline()).await;

    assert!(result.is_err(), "an unarmed timer must never fire");
}

#[tokio::test(start_paused = true)]
async fn test_wait_dropped_early_keeps_deadline() {
    let mut timer = DeadlineTimer::new();
    timer.arm(4, Duration::from_secs(10));

    let early = timeout(Duration::from_secs(1), timer.wait_for_deadline()).await;
    assert!(early.is_err());
    assert_eq!(timer.armed_turn(), Some(4));

    let expired = timer.wait_for_deadline().await;
    assert_eq!(expired.turn_id, 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_reports_lateness() {
    let mut timer = DeadlineTimer::new();
    timer.arm(1, Duration::from_secs(1));
    tokio::time::advance(Duration::from_secs(3)).await;

    let expired = timer.wait_for_deadline().await;

    assert!(expired.late_by >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_wait_in_select_loses_to_ready_branch() {
    let mut timer = DeadlineTimer::new();
    timer.arm(1, Duration::from_secs(10));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<u32>(1);
    tx.send(9).await.unwrap();

    let got = tokio::select! {
        biased;
        Some(v) = rx.recv() => v,
        _ = timer.wait_for_deadline() => 0,
    };

    assert_eq!(got, 9);
    assert!(timer.is_armed());
}
