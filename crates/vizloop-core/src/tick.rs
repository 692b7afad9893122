//! Tick functions, the context they receive, and the ways they fail.
//!
//! A tick function maps the previous state and the tick index to the next
//! state. It cannot reach the scheduler directly; instead it receives a
//! [`TickContext`] through which it can ask the scheduler to stop once
//! the returned state has been applied. This is how visualizations end on
//! terminal states such as "goal reached" or "crashed".

use std::any::Any;

use crate::clock::ClockError;

/// Boxed error returned by fallible tick functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Type-erased state transition: `(previous, tick_index, ctx) -> next`.
pub(crate) type TickFn<S> =
    Box<dyn FnMut(&S, u64, &mut TickContext) -> Result<S, BoxError> + Send + 'static>;

/// Type-erased log projection: `state -> entry`.
pub(crate) type LogFn<S, L> = Box<dyn FnMut(&S) -> L + Send + 'static>;

/// Per-tick handle passed to the tick function.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickContext {
    stop_requested: bool,
}

impl TickContext {
    /// Create a context with no pending requests.
    pub const fn new() -> Self {
        Self {
            stop_requested: false,
        }
    }

    /// Ask the scheduler to stop after applying the state this tick returns.
    ///
    /// Calling it more than once in the same tick has no further effect.
    pub const fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether [`stop`](Self::stop) was called during this tick.
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

/// Errors raised while applying a tick.
///
/// When any of these occurs the tick is discarded: state, tick index, and
/// logs keep their previous values and the scheduler stops.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The tick function returned an error.
    #[error("tick function failed at tick {tick_index}: {source}")]
    Failed {
        /// Index of the tick that failed.
        tick_index: u64,
        /// The error returned by the tick function.
        source: BoxError,
    },

    /// The tick function panicked.
    #[error("tick function panicked at tick {tick_index}: {message}")]
    Panicked {
        /// Index of the tick that panicked.
        tick_index: u64,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// The log function panicked.
    #[error("log function panicked at tick {tick_index}: {message}")]
    LogPanicked {
        /// Index of the tick whose log entry could not be produced.
        tick_index: u64,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// The tick counter cannot advance any further.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

impl TickError {
    /// Index of the tick that failed, when known.
    pub const fn tick_index(&self) -> Option<u64> {
        match self {
            Self::Failed { tick_index, .. }
            | Self::Panicked { tick_index, .. }
            | Self::LogPanicked { tick_index, .. } => Some(*tick_index),
            Self::Clock { .. } => None,
        }
    }
}

/// Render a caught panic payload for logs and status.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}
