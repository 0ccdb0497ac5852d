//! Scheduler
//!
//! Maps wall-clock time onto phase transitions. Boundary arithmetic is pure;
//! the `Scheduler` applies it to the live companion on every tick.

mod boundary;
pub mod config;
mod core;

pub use boundary::{
    due_boundary, expected_boundary, fires_after, latest_occurrence, next_occurrence, pending_boundary,
    upcoming_boundary,
};
pub use config::{PhaseSlot, ScheduleConfig, ScheduleError, hhmm, parse_hhmm};
pub use core::{DueOutcome, DuePhase, ReconfigureError, Scheduler, SchedulerStatus};
