//! Timer-driven simulation scheduler.
//!
//! [`SimulationScheduler`] owns a piece of simulation state and advances it
//! by applying the configured tick function once per tick interval while
//! running. Consumers drive it with [`start`], [`stop`], [`reset`], and
//! [`teardown`], and read it through snapshots or a [`watch`] subscription.
//!
//! # Scheduling
//!
//! Each [`start`] spawns one timer task on the tokio runtime captured at
//! construction. The first tick is due one interval after `start`; later
//! ticks follow at the same interval with [`MissedTickBehavior::Delay`], so
//! a late tick pushes the schedule back instead of producing a burst of
//! catch-up ticks. The task holds only a [`Weak`] reference to the state.
//!
//! # Epochs
//!
//! Every `start` opens a new run epoch and every `stop`, `reset`, or
//! `teardown` closes it. A tick re-checks, under the state lock, that the
//! scheduler is still running in the epoch that armed it before applying
//! anything, so a timer that fired just before `stop` is a no-op.
//!
//! # Failure
//!
//! A tick function error, a panic in the tick or log function, or a tick
//! counter overflow discards the tick, stops the scheduler, and records the
//! error (see [`take_error`]).
//!
//! [`start`]: SimulationScheduler::start
//! [`stop`]: SimulationScheduler::stop
//! [`reset`]: SimulationScheduler::reset
//! [`teardown`]: SimulationScheduler::teardown
//! [`take_error`]: SimulationScheduler::take_error

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::clock::TickClock;
use crate::config::{ConfigError, SimulationConfig};
use crate::history::LogBuffer;
use crate::status::{SchedulerId, SchedulerStatus, duration_ms};
use crate::tick::{LogFn, TickContext, TickError, TickFn, panic_message};

/// State shared between the scheduler handle and its timer task.
struct Shared<S, L> {
    id: SchedulerId,
    initial_state: S,
    state: S,
    clock: TickClock,
    logs: LogBuffer<L>,
    on_tick: TickFn<S>,
    on_log: Option<LogFn<S, L>>,
    tick_rate: Duration,
    running: bool,
    torn_down: bool,
    /// Incremented on every start and every cancellation.
    epoch: u64,
    timer: Option<JoinHandle<()>>,
    last_error: Option<TickError>,
    started_at: Option<DateTime<Utc>>,
    status_tx: watch::Sender<SchedulerStatus>,
}

impl<S, L> Shared<S, L> {
    fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            id: self.id,
            tick_index: self.clock.tick(),
            running: self.running,
            torn_down: self.torn_down,
            tick_rate_ms: duration_ms(self.tick_rate),
            log_len: self.logs.len(),
            log_capacity: self.logs.capacity(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
            started_at: self.started_at,
        }
    }

    fn publish(&self) {
        let _previous = self.status_tx.send_replace(self.status());
    }

    const fn is_current(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }

    /// Close the current epoch and abort its timer task.
    fn cancel_timer(&mut self) {
        self.running = false;
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn fail(&mut self, err: TickError) -> ControlFlow<()> {
        error!(
            scheduler = %self.id,
            tick_index = ?err.tick_index(),
            error = %err,
            "Tick failed, scheduler stopped"
        );
        self.last_error = Some(err);
        self.cancel_timer();
        self.publish();
        ControlFlow::Break(())
    }

    /// Apply one tick: run the tick function, project the log entry, then
    /// commit state, counter, and log together.
    fn apply_tick(&mut self) -> ControlFlow<()> {
        let tick_index = self.clock.tick();
        let mut ctx = TickContext::new();

        let outcome = {
            let on_tick = &mut self.on_tick;
            let prev = &self.state;
            panic::catch_unwind(AssertUnwindSafe(|| on_tick(prev, tick_index, &mut ctx)))
        };
        let next = match outcome {
            Ok(Ok(next)) => next,
            Ok(Err(source)) => return self.fail(TickError::Failed { tick_index, source }),
            Err(payload) => {
                return self.fail(TickError::Panicked {
                    tick_index,
                    message: panic_message(&*payload),
                });
            }
        };

        let mut clock = self.clock;
        if let Err(source) = clock.advance() {
            return self.fail(source.into());
        }

        let logged = self
            .on_log
            .as_mut()
            .map(|on_log| panic::catch_unwind(AssertUnwindSafe(|| on_log(&next))));
        let entry = match logged {
            Some(Ok(entry)) => Some(entry),
            Some(Err(payload)) => {
                return self.fail(TickError::LogPanicked {
                    tick_index,
                    message: panic_message(&*payload),
                });
            }
            None => None,
        };

        self.state = next;
        self.clock = clock;
        if let Some(entry) = entry {
            let _evicted = self.logs.push(entry);
        }
        debug!(scheduler = %self.id, tick_index, "Tick applied");

        if ctx.stop_requested() {
            info!(
                scheduler = %self.id,
                tick_index = self.clock.tick(),
                "Tick function requested stop"
            );
            self.cancel_timer();
            self.publish();
            return ControlFlow::Break(());
        }

        self.publish();
        ControlFlow::Continue(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a single tick if `epoch` is still the live run.
fn tick_once<S, L>(shared: &Weak<Mutex<Shared<S, L>>>, epoch: u64) -> ControlFlow<()> {
    let Some(shared) = shared.upgrade() else {
        return ControlFlow::Break(());
    };
    let mut guard = lock(&shared);
    if !guard.is_current(epoch) {
        return ControlFlow::Break(());
    }
    guard.apply_tick()
}

async fn run_timer<S, L>(
    shared: Weak<Mutex<Shared<S, L>>>,
    epoch: u64,
    first: Instant,
    period: Duration,
) {
    let mut ticks = time::interval_at(first, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let _deadline = ticks.tick().await;
        if tick_once(&shared, epoch).is_break() {
            break;
        }
    }
}

/// Handle to a running or stopped simulation.
///
/// Dropping the handle tears the scheduler down.
pub struct SimulationScheduler<S, L = ()> {
    id: SchedulerId,
    shared: Arc<Mutex<Shared<S, L>>>,
    runtime: Handle,
}

impl<S, L> SimulationScheduler<S, L>
where
    S: Clone + Send + 'static,
    L: Send + 'static,
{
    /// Create a stopped scheduler on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoRuntime`] when called outside a runtime.
    pub fn new(config: SimulationConfig<S, L>) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a stopped scheduler whose timer runs on `runtime`.
    pub fn with_runtime(config: SimulationConfig<S, L>, runtime: Handle) -> Self {
        let id = SchedulerId::new();
        let SimulationConfig {
            initial_state,
            on_tick,
            tick_rate,
            on_log,
            log_capacity,
        } = config;

        let logs = LogBuffer::new(log_capacity);
        let status_tx = watch::Sender::new(SchedulerStatus {
            id,
            tick_index: 0,
            running: false,
            torn_down: false,
            tick_rate_ms: duration_ms(tick_rate),
            log_len: 0,
            log_capacity: logs.capacity(),
            last_error: None,
            started_at: None,
        });

        debug!(
            scheduler = %id,
            tick_rate_ms = duration_ms(tick_rate),
            log_capacity = logs.capacity(),
            "Simulation scheduler created"
        );

        let shared = Shared {
            id,
            state: initial_state.clone(),
            initial_state,
            clock: TickClock::new(),
            logs,
            on_tick,
            on_log,
            tick_rate,
            running: false,
            torn_down: false,
            epoch: 0,
            timer: None,
            last_error: None,
            started_at: None,
            status_tx,
        };

        Self {
            id,
            shared: Arc::new(Mutex::new(shared)),
            runtime,
        }
    }

    /// Arm the timer. No-op if already running or torn down.
    ///
    /// Clears any error recorded by the previous run.
    pub fn start(&self) {
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;
        if shared.running || shared.torn_down {
            return;
        }
        shared.epoch = shared.epoch.wrapping_add(1);
        shared.running = true;
        shared.last_error = None;
        shared.started_at = Some(Utc::now());

        // The first deadline is fixed here, not when the task is first polled.
        let first = Instant::now()
            .checked_add(shared.tick_rate)
            .unwrap_or_else(Instant::now);
        let timer = run_timer(
            Arc::downgrade(&self.shared),
            shared.epoch,
            first,
            shared.tick_rate,
        );
        shared.timer = Some(self.runtime.spawn(timer));

        info!(
            scheduler = %self.id,
            tick_index = shared.clock.tick(),
            tick_rate_ms = duration_ms(shared.tick_rate),
            "Simulation scheduler started"
        );
        shared.publish();
    }

    /// Cancel the timer and restore the initial state, tick index 0, and
    /// an empty log. The scheduler is left stopped.
    pub fn reset(&self) {
        let mut guard = lock(&self.shared);
        let shared = &mut *guard;
        shared.cancel_timer();
        shared.state = shared.initial_state.clone();
        shared.clock.reset();
        shared.logs.clear();
        shared.last_error = None;
        shared.started_at = None;
        info!(scheduler = %self.id, "Simulation scheduler reset");
        shared.publish();
    }

    /// Clone of the current state.
    pub fn state(&self) -> S {
        lock(&self.shared).state.clone()
    }
}

impl<S, L> SimulationScheduler<S, L> {
    /// Identifier of this scheduler.
    pub const fn id(&self) -> SchedulerId {
        self.id
    }

    /// Cancel the timer. No-op if not running.
    ///
    /// State, tick index, and logs are kept.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        if !shared.running {
            return;
        }
        shared.cancel_timer();
        info!(
            scheduler = %self.id,
            tick_index = shared.clock.tick(),
            "Simulation scheduler stopped"
        );
        shared.publish();
    }

    /// Unmount: cancel the timer unconditionally and refuse future starts.
    ///
    /// Safe to call any number of times; also run on drop.
    pub fn teardown(&self) {
        let mut shared = lock(&self.shared);
        if shared.torn_down {
            return;
        }
        shared.torn_down = true;
        shared.cancel_timer();
        info!(
            scheduler = %self.id,
            tick_index = shared.clock.tick(),
            "Simulation scheduler torn down"
        );
        shared.publish();
    }

    /// Borrow the current state without cloning it.
    ///
    /// `f` runs while the scheduler is locked; keep it short.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.shared).state)
    }

    /// Whether the timer is armed.
    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        lock(&self.shared).torn_down
    }

    /// Number of ticks applied since construction or the last reset.
    pub fn tick_index(&self) -> u64 {
        lock(&self.shared).clock.tick()
    }

    /// Configured interval between ticks.
    pub fn tick_rate(&self) -> Duration {
        lock(&self.shared).tick_rate
    }

    /// Number of log entries currently retained.
    pub fn log_len(&self) -> usize {
        lock(&self.shared).logs.len()
    }

    /// Snapshot of the control-plane status.
    pub fn status(&self) -> SchedulerStatus {
        lock(&self.shared).status()
    }

    /// Receive a fresh [`SchedulerStatus`] after every applied tick and
    /// every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        lock(&self.shared).status_tx.subscribe()
    }

    /// Remove and return the error that stopped the last run, if any.
    pub fn take_error(&self) -> Option<TickError> {
        let mut shared = lock(&self.shared);
        let err = shared.last_error.take();
        if err.is_some() {
            shared.publish();
        }
        err
    }
}

impl<S, L: Clone> SimulationScheduler<S, L> {
    /// Retained log entries, oldest first.
    pub fn logs(&self) -> Vec<L> {
        lock(&self.shared).logs.to_vec()
    }

    /// Most recent log entry.
    pub fn latest_log(&self) -> Option<L> {
        lock(&self.shared).logs.latest().cloned()
    }
}

impl<S, L> Drop for SimulationScheduler<S, L> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<S, L> core::fmt::Debug for SimulationScheduler<S, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationScheduler")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn counter_config() -> SimulationConfig<u64, u64> {
        SimulationConfig::builder(0_u64)
            .tick_rate(Duration::from_millis(100))
            .on_tick(|prev, _, _| prev.saturating_add(1))
            .on_log(|state| *state)
            .build()
            .unwrap()
    }

    #[test]
    fn construction_outside_runtime_fails_fast() {
        let result = SimulationScheduler::new(counter_config());
        assert!(matches!(result, Err(ConfigError::NoRuntime { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_from_a_closed_epoch_is_not_applied() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        let weak = Arc::downgrade(&scheduler.shared);

        scheduler.start();
        let stale = lock(&scheduler.shared).epoch;
        scheduler.stop();
        assert!(tick_once(&weak, stale).is_break());
        assert_eq!(scheduler.tick_index(), 0);

        // A restart opens a new epoch; the old timer still may not tick.
        scheduler.start();
        assert!(tick_once(&weak, stale).is_break());
        assert_eq!(scheduler.tick_index(), 0);

        let current = lock(&scheduler.shared).epoch;
        assert!(tick_once(&weak, current).is_continue());
        assert_eq!(scheduler.tick_index(), 1);
        assert_eq!(scheduler.state(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_after_handle_dropped_is_not_applied() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        let weak = Arc::downgrade(&scheduler.shared);
        scheduler.start();
        let epoch = lock(&scheduler.shared).epoch;
        drop(scheduler);
        assert!(tick_once(&weak, epoch).is_break());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_overflow_discards_tick_and_stops() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        lock(&scheduler.shared).clock = TickClock::starting_at(u64::MAX);

        scheduler.start();
        time::sleep(Duration::from_millis(150)).await;

        assert!(!scheduler.is_running());
        assert_eq!(scheduler.state(), 0);
        assert!(scheduler.logs().is_empty());
        assert!(matches!(
            scheduler.take_error(),
            Some(TickError::Clock { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn status_reflects_lifecycle() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        let status = scheduler.status();
        assert_eq!(status.id, scheduler.id());
        assert!(!status.running);
        assert_eq!(status.tick_rate_ms, 100);
        assert_eq!(status.log_capacity, 50);
        assert!(status.started_at.is_none());

        scheduler.start();
        time::sleep(Duration::from_millis(250)).await;
        let status = scheduler.status();
        assert!(status.running);
        assert_eq!(status.tick_index, 2);
        assert_eq!(status.log_len, 2);
        assert!(status.started_at.is_some());

        scheduler.teardown();
        let status = scheduler.status();
        assert!(!status.running);
        assert!(status.torn_down);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_start_time() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        scheduler.start();
        time::sleep(Duration::from_millis(150)).await;
        assert!(scheduler.status().started_at.is_some());

        scheduler.reset();
        let status = scheduler.status();
        assert!(status.started_at.is_none());
        assert_eq!(status.tick_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn with_state_borrows_current_state() {
        let scheduler = SimulationScheduler::new(counter_config()).unwrap();
        scheduler.start();
        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(scheduler.with_state(|count| count.saturating_mul(10)), 30);
        assert_eq!(scheduler.latest_log(), Some(3));
    }
}
