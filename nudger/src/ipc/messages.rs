//! IPC message types
//!
//! Each message is a single line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};

use crate::domain::Phase;

/// Messages from the CLI to the running companion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum HealthMessage {
    /// Liveness check
    Ping,

    /// Current phase and interrupt flag
    Health,

    /// Stop gracefully
    Shutdown,
}

/// Responses from the running companion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum HealthResponse {
    Ok,

    Pong { version: String },

    Health {
        /// "ok", or "paused" while the scheduler is disabled
        status: String,
        current_phase: Phase,
        interrupted: bool,
    },

    Error { message: String },
}
