//! State management with actor pattern
//!
//! StateManager owns the JsonStore and processes commands via channels,
//! serialising every read and write of persisted state.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
