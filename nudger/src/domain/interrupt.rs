//! InterruptContext domain type

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Phase, Turn};

/// Snapshot taken when an urgent message suspends the normal phase flow.
///
/// `saved_phase` is always one of the five cycle phases; the machine
/// restores it on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptContext {
    pub id: Uuid,
    pub saved_phase: Phase,
    /// The inbound text that triggered the interrupt
    pub trigger: String,
    /// Matched keyword or other reason
    pub reason: String,
    pub entered_at: NaiveDateTime,
    /// Recent turns at the moment of the interrupt
    #[serde(default)]
    pub conversation: Vec<Turn>,
}

impl InterruptContext {
    pub fn new(
        saved_phase: Phase,
        trigger: impl Into<String>,
        reason: impl Into<String>,
        conversation: Vec<Turn>,
        entered_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            saved_phase,
            trigger: trigger.into(),
            reason: reason.into(),
            entered_at,
            conversation,
        }
    }
}
