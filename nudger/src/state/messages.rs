//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{CompanionSnapshot, DailyPlan, UserProfile};
use crate::scheduler::ScheduleConfig;
use crate::store::StoreError;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<StoreError> for StateError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Json { .. } => Self::DeserializationError(e.to_string()),
            other => Self::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Profile
    LoadProfile {
        reply: oneshot::Sender<StateResponse<Option<UserProfile>>>,
    },
    SaveProfile {
        profile: Box<UserProfile>,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Companion snapshot (phase, interrupt, plan, scheduler flags)
    LoadSnapshot {
        reply: oneshot::Sender<StateResponse<Option<CompanionSnapshot>>>,
    },
    SaveSnapshot {
        snapshot: Box<CompanionSnapshot>,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Schedule overrides
    LoadSchedule {
        reply: oneshot::Sender<StateResponse<Option<ScheduleConfig>>>,
    },
    SaveSchedule {
        schedule: ScheduleConfig,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Plan history
    ArchivePlan {
        plan: Box<DailyPlan>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    PlanHistory {
        limit: usize,
        reply: oneshot::Sender<StateResponse<Vec<DailyPlan>>>,
    },

    // Lifecycle
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
