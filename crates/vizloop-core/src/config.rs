//! Simulation configuration and validation.
//!
//! A [`SimulationConfig`] bundles everything a scheduler needs: the initial
//! state, the tick function, the tick rate, an optional log projection, and
//! the log capacity. It is assembled with [`SimulationConfigBuilder`] and
//! validated once in [`SimulationConfigBuilder::build`]; a built config is
//! immutable. Changing any of it means building a new scheduler.
//!
//! [`SchedulerSettings`] is the serializable subset (tick rate and log
//! capacity) that binaries read from their configuration files.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tick::{BoxError, LogFn, TickContext, TickFn};

/// Default number of log entries retained by a scheduler.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

/// Default tick interval in milliseconds.
pub const DEFAULT_TICK_RATE_MS: u64 = 100;

/// Errors that can occur when building a simulation configuration or
/// constructing a scheduler from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The tick rate was zero (or never set).
    #[error("tick rate must be greater than zero")]
    NonPositiveTickRate,

    /// No tick function was supplied.
    #[error("a tick function is required")]
    MissingTickFn,

    /// The log capacity was zero.
    #[error("log capacity must be at least 1")]
    ZeroLogCapacity,

    /// The scheduler was constructed outside a tokio runtime.
    #[error("no tokio runtime available: {source}")]
    NoRuntime {
        /// The underlying runtime lookup error.
        #[from]
        source: tokio::runtime::TryCurrentError,
    },
}

/// Validated, immutable scheduler configuration.
pub struct SimulationConfig<S, L = ()> {
    pub(crate) initial_state: S,
    pub(crate) on_tick: TickFn<S>,
    pub(crate) tick_rate: Duration,
    pub(crate) on_log: Option<LogFn<S, L>>,
    pub(crate) log_capacity: NonZeroUsize,
}

impl<S> SimulationConfig<S, ()> {
    /// Start building a configuration around `initial_state`.
    ///
    /// The builder has no tick function and a zero tick rate; both must be
    /// set before [`build`](SimulationConfigBuilder::build) succeeds.
    pub const fn builder(initial_state: S) -> SimulationConfigBuilder<S, ()> {
        SimulationConfigBuilder {
            initial_state,
            on_tick: None,
            tick_rate: Duration::ZERO,
            on_log: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl<S, L> SimulationConfig<S, L> {
    /// The state restored by every reset.
    pub const fn initial_state(&self) -> &S {
        &self.initial_state
    }

    /// Interval between ticks.
    pub const fn tick_rate(&self) -> Duration {
        self.tick_rate
    }

    /// Maximum number of retained log entries.
    pub const fn log_capacity(&self) -> usize {
        self.log_capacity.get()
    }

    /// Whether a log projection was supplied.
    pub const fn has_log_fn(&self) -> bool {
        self.on_log.is_some()
    }
}

impl<S: fmt::Debug, L> fmt::Debug for SimulationConfig<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationConfig")
            .field("initial_state", &self.initial_state)
            .field("tick_rate", &self.tick_rate)
            .field("has_log_fn", &self.on_log.is_some())
            .field("log_capacity", &self.log_capacity)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SimulationConfig`].
pub struct SimulationConfigBuilder<S, L> {
    initial_state: S,
    on_tick: Option<TickFn<S>>,
    tick_rate: Duration,
    on_log: Option<LogFn<S, L>>,
    log_capacity: usize,
}

impl<S, L> SimulationConfigBuilder<S, L> {
    /// Set the interval between ticks.
    #[must_use]
    pub const fn tick_rate(mut self, tick_rate: Duration) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Set the maximum number of retained log entries.
    #[must_use]
    pub const fn log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }

    /// Apply tick rate and log capacity from file-level settings.
    #[must_use]
    pub const fn settings(self, settings: &SchedulerSettings) -> Self {
        self.tick_rate(settings.tick_rate())
            .log_capacity(settings.log_capacity)
    }

    /// Set an infallible tick function.
    ///
    /// The function receives the previous state and the index of the tick
    /// being applied (before increment). It should be a pure function of
    /// its inputs so that a reset replays the same trajectory.
    #[must_use]
    pub fn on_tick<F>(mut self, mut on_tick: F) -> Self
    where
        F: FnMut(&S, u64, &mut TickContext) -> S + Send + 'static,
    {
        self.on_tick = Some(Box::new(
            move |prev: &S, tick_index: u64, ctx: &mut TickContext| {
                Ok(on_tick(prev, tick_index, ctx))
            },
        ));
        self
    }

    /// Set a fallible tick function.
    ///
    /// An `Err` discards the tick and stops the scheduler; the error is kept
    /// as the scheduler's last error.
    #[must_use]
    pub fn try_on_tick<F, E>(mut self, mut on_tick: F) -> Self
    where
        F: FnMut(&S, u64, &mut TickContext) -> Result<S, E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.on_tick = Some(Box::new(
            move |prev: &S, tick_index: u64, ctx: &mut TickContext| {
                on_tick(prev, tick_index, ctx).map_err(Into::into)
            },
        ));
        self
    }

    /// Set the log projection, invoked with the new state after each tick.
    ///
    /// Replaces any previously configured projection.
    #[must_use]
    pub fn on_log<L2, F>(self, on_log: F) -> SimulationConfigBuilder<S, L2>
    where
        F: FnMut(&S) -> L2 + Send + 'static,
    {
        SimulationConfigBuilder {
            initial_state: self.initial_state,
            on_tick: self.on_tick,
            tick_rate: self.tick_rate,
            on_log: Some(Box::new(on_log)),
            log_capacity: self.log_capacity,
        }
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositiveTickRate`] for a zero tick rate,
    /// [`ConfigError::MissingTickFn`] if no tick function was set, and
    /// [`ConfigError::ZeroLogCapacity`] for a zero log capacity.
    pub fn build(self) -> Result<SimulationConfig<S, L>, ConfigError> {
        if self.tick_rate.is_zero() {
            return Err(ConfigError::NonPositiveTickRate);
        }
        let on_tick = self.on_tick.ok_or(ConfigError::MissingTickFn)?;
        let log_capacity =
            NonZeroUsize::new(self.log_capacity).ok_or(ConfigError::ZeroLogCapacity)?;
        Ok(SimulationConfig {
            initial_state: self.initial_state,
            on_tick,
            tick_rate: self.tick_rate,
            on_log: self.on_log,
            log_capacity,
        })
    }
}

impl<S: fmt::Debug, L> fmt::Debug for SimulationConfigBuilder<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationConfigBuilder")
            .field("initial_state", &self.initial_state)
            .field("has_tick_fn", &self.on_tick.is_some())
            .field("tick_rate", &self.tick_rate)
            .field("has_log_fn", &self.on_log.is_some())
            .field("log_capacity", &self.log_capacity)
            .finish()
    }
}

/// Scheduler parameters as they appear in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,

    /// Maximum number of retained log entries.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl SchedulerSettings {
    /// Tick interval as a [`Duration`].
    pub const fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_rate_ms: default_tick_rate_ms(),
            log_capacity: default_log_capacity(),
        }
    }
}

const fn default_tick_rate_ms() -> u64 {
    DEFAULT_TICK_RATE_MS
}

const fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}
