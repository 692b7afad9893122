//! Integration tests for the simulation scheduler lifecycle.
//!
//! All tests run on tokio's paused clock, so sleeping advances virtual time
//! exactly and the timer fires at precise multiples of the tick rate.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::{advance, sleep};
use vizloop_core::config::SimulationConfig;
use vizloop_core::scheduler::SimulationScheduler;
use vizloop_core::tick::TickError;

const RATE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Counter {
    count: u64,
}

/// `{count: 0}` incremented by one per tick, logging every state.
fn counter_scheduler(log_capacity: usize) -> SimulationScheduler<Counter, Counter> {
    let config = SimulationConfig::builder(Counter { count: 0 })
        .tick_rate(RATE)
        .log_capacity(log_capacity)
        .on_tick(|prev: &Counter, _, _| Counter {
            count: prev.count.saturating_add(1),
        })
        .on_log(|state: &Counter| state.clone())
        .build()
        .unwrap();
    SimulationScheduler::new(config).unwrap()
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[tokio::test(start_paused = true)]
async fn counter_reaches_three_after_350ms() {
    let scheduler = counter_scheduler(50);
    scheduler.start();
    sleep(ms(350)).await;

    assert_eq!(scheduler.tick_index(), 3);
    assert_eq!(scheduler.state(), Counter { count: 3 });
    assert!(scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn tick_index_counts_elapsed_intervals() {
    let scheduler = counter_scheduler(50);
    scheduler.start();

    // Sample halfway between deadlines.
    sleep(ms(50)).await;
    for expected in 1..=10 {
        sleep(RATE).await;
        assert_eq!(scheduler.tick_index(), expected);
        assert_eq!(scheduler.state().count, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn tick_function_sees_index_before_increment() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(move |prev, tick_index, _| {
            recorder.lock().unwrap().push((*prev, tick_index));
            prev.saturating_add(10)
        })
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(350)).await;

    assert_eq!(*seen.lock().unwrap(), vec![(0, 0), (10, 1), (20, 2)]);
}

#[tokio::test(start_paused = true)]
async fn reset_then_start_replays_identical_trajectory() {
    let config = SimulationConfig::builder(vec![1_u64, 1])
        .tick_rate(RATE)
        .on_tick(|prev: &Vec<u64>, tick_index, _| {
            // Fibonacci-like growth mixed with the tick index.
            let a = prev.first().copied().unwrap_or(0);
            let b = prev.get(1).copied().unwrap_or(0);
            vec![b, a.wrapping_add(b).wrapping_add(tick_index)]
        })
        .on_log(|state: &Vec<u64>| state.clone())
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(750)).await;
    let first_logs = scheduler.logs();
    let first_state = scheduler.state();
    let first_index = scheduler.tick_index();

    scheduler.reset();
    scheduler.start();
    sleep(ms(750)).await;

    assert_eq!(first_index, 7);
    assert_eq!(scheduler.tick_index(), first_index);
    assert_eq!(scheduler.state(), first_state);
    assert_eq!(scheduler.logs(), first_logs);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_keeps_progress() {
    let scheduler = counter_scheduler(50);
    scheduler.start();
    sleep(ms(250)).await;

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_running());

    sleep(ms(1_000)).await;
    assert_eq!(scheduler.tick_index(), 2);
    assert_eq!(scheduler.state(), Counter { count: 2 });
    assert_eq!(scheduler.logs().len(), 2);

    // Resuming continues from where it stopped.
    scheduler.start();
    sleep(ms(150)).await;
    assert_eq!(scheduler.tick_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_when_never_started_is_a_no_op() {
    let scheduler = counter_scheduler(50);
    scheduler.stop();
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.tick_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_twice_does_not_arm_a_second_timer() {
    let scheduler = counter_scheduler(50);
    scheduler.start();
    scheduler.start();
    sleep(ms(350)).await;
    assert_eq!(scheduler.tick_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_state_index_and_logs() {
    let scheduler = counter_scheduler(50);
    scheduler.start();
    sleep(ms(450)).await;
    assert_eq!(scheduler.tick_index(), 4);

    scheduler.reset();

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), Counter { count: 0 });
    assert_eq!(scheduler.tick_index(), 0);
    assert!(scheduler.logs().is_empty());

    // Reset leaves the scheduler stopped.
    sleep(ms(500)).await;
    assert_eq!(scheduler.tick_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn logs_keep_most_recent_entries_in_order() {
    let scheduler = counter_scheduler(3);
    scheduler.start();
    sleep(ms(750)).await;

    let counts: Vec<u64> = scheduler.logs().iter().map(|c| c.count).collect();
    assert_eq!(counts, vec![5, 6, 7]);
    assert_eq!(scheduler.log_len(), 3);
}

#[tokio::test(start_paused = true)]
async fn immediate_stop_applies_no_ticks() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(move |prev, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            prev.saturating_add(1)
        })
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    scheduler.stop();
    sleep(ms(1_000)).await;

    assert_eq!(scheduler.tick_index(), 0);
    assert_eq!(scheduler.state(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn teardown_while_running_freezes_state() {
    let scheduler = counter_scheduler(50);
    scheduler.start();
    sleep(ms(250)).await;

    scheduler.teardown();
    let frozen = scheduler.state();
    sleep(ms(500)).await;

    assert_eq!(scheduler.state(), frozen);
    assert_eq!(scheduler.tick_index(), 2);
    assert!(!scheduler.is_running());
    assert!(scheduler.is_torn_down());

    // Teardown is idempotent and blocks restarts.
    scheduler.teardown();
    scheduler.start();
    sleep(ms(500)).await;
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.tick_index(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_scheduler_cancels_the_timer() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(move |prev, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            prev.saturating_add(1)
        })
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(scheduler);
    sleep(ms(1_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn terminal_state_stops_scheduler() {
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(|prev, _, ctx| {
            if *prev >= 3 {
                ctx.stop();
                return *prev;
            }
            let next = prev.saturating_add(1);
            if next == 3 {
                ctx.stop();
            }
            next
        })
        .on_log(|state| *state)
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(1_000)).await;

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), 3);
    assert_eq!(scheduler.tick_index(), 3);
    assert_eq!(scheduler.logs(), vec![1, 2, 3]);
    assert!(scheduler.take_error().is_none());

    // Restarting from a terminal state is idempotent: one more tick, same state.
    scheduler.start();
    sleep(ms(150)).await;
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), 3);
    assert_eq!(scheduler.tick_index(), 4);
}

#[tokio::test(start_paused = true)]
async fn tick_error_stops_and_restart_resumes() {
    let armed = Arc::new(AtomicBool::new(true));
    let trigger = Arc::clone(&armed);
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .try_on_tick(move |prev, tick_index, _| {
            if tick_index == 2 && trigger.swap(false, Ordering::SeqCst) {
                return Err(format!("solver diverged at {tick_index}"));
            }
            Ok(prev.saturating_add(1))
        })
        .on_log(|state| *state)
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(1_000)).await;

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), 2);
    assert_eq!(scheduler.tick_index(), 2);
    assert_eq!(scheduler.logs(), vec![1, 2]);
    let status = scheduler.status();
    assert!(status.last_error.unwrap().contains("solver diverged at 2"));

    scheduler.start();
    assert!(scheduler.status().last_error.is_none());
    sleep(ms(250)).await;
    assert_eq!(scheduler.state(), 4);
    assert_eq!(scheduler.tick_index(), 4);
    assert!(!armed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn take_error_returns_failure_once() {
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .try_on_tick(|_, _, _| Err::<u64, _>("always fails"))
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(150)).await;

    match scheduler.take_error() {
        Some(TickError::Failed { tick_index, source }) => {
            assert_eq!(tick_index, 0);
            assert_eq!(source.to_string(), "always fails");
        }
        other => panic!("expected a tick failure, got {other:?}"),
    }
    assert!(scheduler.take_error().is_none());
    assert!(scheduler.status().last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn panicking_tick_function_is_contained() {
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(|prev, tick_index, _| {
            assert!(tick_index < 1, "integrator blew up");
            prev.saturating_add(1)
        })
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(500)).await;

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), 1);
    match scheduler.take_error() {
        Some(TickError::Panicked { tick_index, message }) => {
            assert_eq!(tick_index, 1);
            assert!(message.contains("integrator blew up"));
        }
        other => panic!("expected a panic report, got {other:?}"),
    }

    // The scheduler is still usable after a contained panic.
    scheduler.reset();
    scheduler.start();
    sleep(ms(150)).await;
    assert_eq!(scheduler.state(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicking_log_function_discards_the_tick() {
    let config = SimulationConfig::builder(0_u64)
        .tick_rate(RATE)
        .on_tick(|prev, _, _| prev.saturating_add(1))
        .on_log(|state: &u64| {
            assert!(*state < 2, "log sink full");
            *state
        })
        .build()
        .unwrap();
    let scheduler = SimulationScheduler::new(config).unwrap();

    scheduler.start();
    sleep(ms(500)).await;

    assert!(!scheduler.is_running());
    assert_eq!(scheduler.state(), 1);
    assert_eq!(scheduler.tick_index(), 1);
    assert_eq!(scheduler.logs(), vec![1]);
    assert!(matches!(
        scheduler.take_error(),
        Some(TickError::LogPanicked { tick_index: 1, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn late_ticks_are_delayed_not_burst() {
    let scheduler = counter_scheduler(50);
    scheduler.start();

    // Jump well past several deadlines before the timer gets to run.
    advance(ms(550)).await;
    sleep(ms(1)).await;
    assert_eq!(scheduler.tick_index(), 1);

    // The next tick is one full interval after the late one.
    sleep(ms(98)).await;
    assert_eq!(scheduler.tick_index(), 1);
    sleep(ms(2)).await;
    assert_eq!(scheduler.tick_index(), 2);
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_ticks_and_lifecycle() {
    let scheduler = counter_scheduler(50);
    let mut updates = scheduler.subscribe();
    assert!(!updates.borrow().running);

    scheduler.start();
    updates.changed().await.unwrap();
    assert!(updates.borrow_and_update().running);

    updates.changed().await.unwrap();
    let status = updates.borrow_and_update().clone();
    assert_eq!(status.tick_index, 1);
    assert_eq!(status.log_len, 1);

    scheduler.stop();
    updates.changed().await.unwrap();
    assert!(!updates.borrow_and_update().running);
}
