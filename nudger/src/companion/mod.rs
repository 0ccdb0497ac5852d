//! Companion
//!
//! The live state shared by the scheduler and the chat front end, plus the
//! collaborators both of them use to talk to the user.

mod core;
mod state;

pub use core::{AdvanceError, Advanced, Companion, CompanionDeps};
pub use state::{CompanionState, MAX_CONVERSATION};
