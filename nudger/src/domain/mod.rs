//! Domain types for Nudger
//!
//! Core domain types: Phase, UserProfile, DailyPlan, InterruptContext and
//! the persisted CompanionSnapshot. All are plain serde records.

mod conversation;
mod interrupt;
mod phase;
mod plan;
mod profile;
mod snapshot;

pub use conversation::{Role, Turn};
pub use interrupt::InterruptContext;
pub use phase::{ParsePhaseError, Phase};
pub use plan::{DailyPlan, PlanNote};
pub use profile::{InteractionSummary, UserProfile};
pub use snapshot::{Boundary, CompanionSnapshot, MAX_MISSED_HISTORY, MAX_NUDGE_HISTORY, NudgeRecord};
