//! Scheduler identity and status snapshots.
//!
//! A [`SchedulerStatus`] is what a consumer renders or exports: it carries
//! no simulation state, only the control-plane view of one scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one scheduler instance.
///
/// Uses UUID v7 so identifiers sort by creation time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchedulerId(pub Uuid);

impl SchedulerId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SchedulerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON-serializable view of a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Identifier of the scheduler this status describes.
    pub id: SchedulerId,
    /// Number of ticks applied since construction or the last reset.
    pub tick_index: u64,
    /// Whether the timer is armed.
    pub running: bool,
    /// Whether the scheduler has been torn down (unmounted).
    pub torn_down: bool,
    /// Configured interval between ticks, in milliseconds.
    pub tick_rate_ms: u64,
    /// Number of log entries currently retained.
    pub log_len: usize,
    /// Maximum number of retained log entries.
    pub log_capacity: usize,
    /// Message of the last tick error, if one is recorded.
    pub last_error: Option<String>,
    /// Wall-clock time of the most recent `start()`.
    pub started_at: Option<DateTime<Utc>>,
}

/// Convert a tick rate to whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
