//! Tick counter for a running simulation.
//!
//! The clock is the single source of truth for how many ticks have been
//! applied since the last reset. It only moves forward by one, and only
//! through [`TickClock::advance`], which refuses to wrap.

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Monotonic tick counter.
///
/// Starts at 0. The value is the index handed to the next tick function
/// call, which is also the number of ticks applied so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickClock {
    /// Number of ticks applied since construction or the last reset.
    tick: u64,
}

impl TickClock {
    /// Create a clock at tick 0.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Create a clock positioned at an arbitrary tick.
    #[cfg(test)]
    pub(crate) const fn starting_at(tick: u64) -> Self {
        Self { tick }
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Return the current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Rewind the clock to tick 0.
    pub const fn reset(&mut self) {
        self.tick = 0;
    }
}
