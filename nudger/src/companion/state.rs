//! In-memory companion state

use chrono::NaiveDateTime;

use crate::domain::{
    Boundary, CompanionSnapshot, MAX_MISSED_HISTORY, MAX_NUDGE_HISTORY, NudgeRecord, Turn, UserProfile,
};
use crate::machine::PhaseMachine;
use crate::scheduler::ScheduleConfig;

/// Conversation turns kept in memory
pub const MAX_CONVERSATION: usize = 20;

/// Everything the companion mutates, guarded by a single lock
#[derive(Debug, Clone)]
pub struct CompanionState {
    pub machine: PhaseMachine,
    pub schedule: ScheduleConfig,
    /// Scheduler enabled flag; manual commands work either way
    pub enabled: bool,
    /// Last boundary handed out by a tick
    pub last_fired: Option<Boundary>,
    pub nudges: Vec<NudgeRecord>,
    /// Check-ins passed over while catching up
    pub missed: Vec<Boundary>,
    /// Boundary the last gentle reminder was sent for
    pub last_reminded: Option<Boundary>,
    pub profile: UserProfile,
    pub conversation: Vec<Turn>,
}

impl CompanionState {
    pub fn from_snapshot(snapshot: &CompanionSnapshot, schedule: ScheduleConfig, profile: UserProfile) -> Self {
        Self {
            machine: PhaseMachine::from_snapshot(snapshot),
            schedule,
            enabled: snapshot.scheduler_enabled,
            last_fired: snapshot.last_fired,
            nudges: snapshot.nudges.clone(),
            missed: snapshot.missed.clone(),
            last_reminded: snapshot.last_reminded,
            profile,
            conversation: Vec::new(),
        }
    }

    /// Persistable view of this state
    pub fn snapshot(&self, now: NaiveDateTime) -> CompanionSnapshot {
        let mut snapshot = CompanionSnapshot::initial(now);
        self.machine.write_snapshot(&mut snapshot);
        snapshot.scheduler_enabled = self.enabled;
        snapshot.last_fired = self.last_fired;
        snapshot.nudges = self.nudges.clone();
        snapshot.missed = self.missed.clone();
        snapshot.last_reminded = self.last_reminded;
        snapshot
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.conversation.push(turn);
        if self.conversation.len() > MAX_CONVERSATION {
            let excess = self.conversation.len() - MAX_CONVERSATION;
            self.conversation.drain(..excess);
        }
    }

    pub fn push_nudge(&mut self, record: NudgeRecord) {
        self.nudges.push(record);
        if self.nudges.len() > MAX_NUDGE_HISTORY {
            let excess = self.nudges.len() - MAX_NUDGE_HISTORY;
            self.nudges.drain(..excess);
        }
    }

    pub fn push_missed(&mut self, boundary: Boundary) {
        self.missed.push(boundary);
        if self.missed.len() > MAX_MISSED_HISTORY {
            let excess = self.missed.len() - MAX_MISSED_HISTORY;
            self.missed.drain(..excess);
        }
    }

    /// Missed check-ins whose slot fell on `now`'s date
    pub fn missed_on(&self, now: NaiveDateTime) -> Vec<Boundary> {
        self.missed.iter().filter(|b| b.at.date() == now.date()).copied().collect()
    }
}
