//! Tick scheduling core for Vizloop simulations.
//!
//! Every visualization drives a discrete-time simulation: a pure state
//! transition applied at a fixed cadence while running, with start, stop,
//! and reset controls and a bounded history of log entries. This crate
//! owns that loop so each visualization only supplies its state and its
//! transition function.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter with checked advancement.
//! - [`config`] -- [`SimulationConfig`] builder, validation, and the
//!   serializable [`SchedulerSettings`].
//! - [`history`] -- [`LogBuffer`], the capacity-bounded log history.
//! - [`runner`] -- [`run_for`], a bounded headless run of a scheduler.
//! - [`scheduler`] -- [`SimulationScheduler`], the timer-driven handle.
//! - [`status`] -- [`SchedulerId`] and the [`SchedulerStatus`] snapshot.
//! - [`tick`] -- [`TickContext`] and [`TickError`].
//!
//! [`SimulationConfig`]: config::SimulationConfig
//! [`SchedulerSettings`]: config::SchedulerSettings
//! [`LogBuffer`]: history::LogBuffer
//! [`run_for`]: runner::run_for
//! [`SimulationScheduler`]: scheduler::SimulationScheduler
//! [`SchedulerId`]: status::SchedulerId
//! [`SchedulerStatus`]: status::SchedulerStatus
//! [`TickContext`]: tick::TickContext
//! [`TickError`]: tick::TickError

pub mod clock;
pub mod config;
pub mod history;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod tick;
