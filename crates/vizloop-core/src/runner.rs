//! Bounded headless runs of a scheduler.
//!
//! [`run_for`] starts a scheduler, waits until either the time budget has
//! elapsed or the scheduler stops on its own (terminal state or tick
//! error), tears it down, and returns a [`RunSummary`]. This is what the
//! CLI uses to run a visualization without a UI attached.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scheduler::SimulationScheduler;
use crate::status::SchedulerStatus;

/// Reason a bounded run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEndReason {
    /// The time budget elapsed while the scheduler was still running.
    DurationElapsed,
    /// The tick function requested a stop (terminal state).
    Halted,
    /// A tick failed and the scheduler stopped.
    TickFailed,
}

/// Result of a bounded run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<S, L> {
    /// Why the run ended.
    pub end_reason: RunEndReason,
    /// Scheduler status captured after teardown.
    pub status: SchedulerStatus,
    /// Final simulation state.
    pub final_state: S,
    /// Retained log entries, oldest first.
    pub logs: Vec<L>,
}

/// Run `scheduler` until `budget` elapses or it stops by itself.
///
/// The scheduler is started if it is not already running and is always
/// torn down before this returns.
pub async fn run_for<S, L>(scheduler: SimulationScheduler<S, L>, budget: Duration) -> RunSummary<S, L>
where
    S: Clone + Send + 'static,
    L: Clone + Send + 'static,
{
    let mut updates = scheduler.subscribe();
    scheduler.start();

    info!(
        scheduler = %scheduler.id(),
        budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        "Bounded run starting"
    );

    let deadline = tokio::time::sleep(budget);
    tokio::pin!(deadline);

    let end_reason = loop {
        let status = updates.borrow_and_update().clone();
        if let Some(reason) = stopped_reason(&status) {
            break reason;
        }
        tokio::select! {
            () = &mut deadline => break RunEndReason::DurationElapsed,
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!(scheduler = %scheduler.id(), "Status channel closed");
                    break RunEndReason::Halted;
                }
            }
        }
    };

    scheduler.teardown();
    let status = scheduler.status();
    info!(
        scheduler = %status.id,
        reason = ?end_reason,
        tick_index = status.tick_index,
        "Bounded run ended"
    );

    RunSummary {
        end_reason,
        final_state: scheduler.state(),
        logs: scheduler.logs(),
        status,
    }
}

/// Classify a status whose timer is no longer armed.
fn stopped_reason(status: &SchedulerStatus) -> Option<RunEndReason> {
    if status.running {
        None
    } else if status.last_error.is_some() {
        Some(RunEndReason::TickFailed)
    } else {
        Some(RunEndReason::Halted)
    }
}
