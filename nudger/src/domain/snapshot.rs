//! Persisted companion snapshot
//!
//! Written after every transition so a restart picks up exactly where the
//! process left off.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DailyPlan, InterruptContext, Phase};

/// Most recent nudges kept in the snapshot
pub const MAX_NUDGE_HISTORY: usize = 50;

/// Most recent missed check-ins kept in the snapshot
pub const MAX_MISSED_HISTORY: usize = 50;

/// One scheduled occurrence of a phase's slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundary {
    /// Phase entered when this boundary fires
    pub phase: Phase,
    /// Nominal wall-clock time of the slot
    pub at: NaiveDateTime,
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.phase, self.at.format("%Y-%m-%d %H:%M"))
    }
}

/// A proactive message the scheduler tried to deliver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeRecord {
    pub id: Uuid,
    pub at: NaiveDateTime,
    pub phase: Phase,
    pub text: String,
    pub delivered: bool,
    /// True when the text is a canned fallback rather than generated
    #[serde(default)]
    pub fallback: bool,
}

/// Everything needed to restore the companion after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSnapshot {
    pub phase: Phase,
    pub phase_entered_at: NaiveDateTime,
    /// Nominal start of the current phase; absent in older snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_anchor: Option<NaiveDateTime>,
    #[serde(default)]
    pub interrupt: Option<InterruptContext>,
    pub plan: DailyPlan,
    #[serde(default = "default_enabled")]
    pub scheduler_enabled: bool,
    #[serde(default)]
    pub last_fired: Option<Boundary>,
    #[serde(default)]
    pub nudges: Vec<NudgeRecord>,
    /// Boundaries passed over while catching up, oldest first
    #[serde(default)]
    pub missed: Vec<Boundary>,
    /// Boundary the last gentle reminder was sent for
    #[serde(default)]
    pub last_reminded: Option<Boundary>,
    pub updated_at: NaiveDateTime,
}

fn default_enabled() -> bool {
    true
}

impl CompanionSnapshot {
    /// First-run state: morning planning with an empty plan for today
    pub fn initial(now: NaiveDateTime) -> Self {
        Self {
            phase: Phase::MorningPlanning,
            phase_entered_at: now,
            phase_anchor: None,
            interrupt: None,
            plan: DailyPlan::new(now),
            scheduler_enabled: true,
            last_fired: None,
            nudges: Vec::new(),
            missed: Vec::new(),
            last_reminded: None,
            updated_at: now,
        }
    }

    /// Snapshot stamped with the current local time
    pub fn initial_now() -> Self {
        Self::initial(Local::now().naive_local())
    }
}
