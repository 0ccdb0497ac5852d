//! PhaseMachine implementation

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{CompanionSnapshot, DailyPlan, InterruptContext, Phase, Turn};

/// Errors from machine operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MachineError {
    /// resume was called with no active interrupt
    #[error("Transition inconsistency: resume requested but no interrupt is active (phase {phase})")]
    TransitionInconsistency { phase: Phase },

    /// advance was requested while an interrupt is active
    #[error("Interrupted: advancement suspended while in interrupt mode (saved phase {saved})")]
    Interrupted { saved: Phase },
}

/// Result of a successful advance
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub at: NaiveDateTime,
    /// Plan retired when the cycle wrapped into a new day
    pub archived: Option<DailyPlan>,
}

/// The single current phase plus interrupt mode and the current plan
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseMachine {
    phase: Phase,
    entered_at: NaiveDateTime,
    /// Nominal start of the current phase: the slot time for scheduled
    /// advances, the actual time for manual ones
    anchor: NaiveDateTime,
    interrupt: Option<InterruptContext>,
    plan: DailyPlan,
}

impl PhaseMachine {
    /// Fresh machine in morning planning with an empty plan
    pub fn new(now: NaiveDateTime) -> Self {
        debug!(%now, "PhaseMachine::new: called");
        Self {
            phase: Phase::MorningPlanning,
            entered_at: now,
            anchor: now,
            interrupt: None,
            plan: DailyPlan::new(now),
        }
    }

    /// Restore from a persisted snapshot
    pub fn from_snapshot(snapshot: &CompanionSnapshot) -> Self {
        debug!(phase = %snapshot.phase, interrupted = snapshot.interrupt.is_some(), "from_snapshot: called");
        Self {
            phase: snapshot.phase,
            entered_at: snapshot.phase_entered_at,
            anchor: snapshot.phase_anchor.unwrap_or(snapshot.phase_entered_at),
            interrupt: snapshot.interrupt.clone(),
            plan: snapshot.plan.clone(),
        }
    }

    /// Copy machine state into a snapshot, leaving scheduler fields untouched
    pub fn write_snapshot(&self, snapshot: &mut CompanionSnapshot) {
        snapshot.phase = self.phase;
        snapshot.phase_entered_at = self.entered_at;
        snapshot.phase_anchor = Some(self.anchor);
        snapshot.interrupt = self.interrupt.clone();
        snapshot.plan = self.plan.clone();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entered_at(&self) -> NaiveDateTime {
        self.entered_at
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_some()
    }

    pub fn interrupt(&self) -> Option<&InterruptContext> {
        self.interrupt.as_ref()
    }

    pub fn plan(&self) -> &DailyPlan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut DailyPlan {
        &mut self.plan
    }

    /// Move to the deterministic successor phase.
    ///
    /// Wrapping from nighttime planning archives the current plan (returned in
    /// the transition) and starts a fresh plan for `now`'s date.
    pub fn advance(&mut self, now: NaiveDateTime) -> Result<Transition, MachineError> {
        debug!(phase = %self.phase, %now, "advance: called");
        self.step(now, now)
    }

    /// Advance for a scheduled boundary whose slot started at `nominal`.
    ///
    /// The next boundary is measured from `nominal` rather than from `now`,
    /// so a late firing never hides the following slot.
    pub fn advance_on_schedule(&mut self, nominal: NaiveDateTime, now: NaiveDateTime) -> Result<Transition, MachineError> {
        debug!(phase = %self.phase, %nominal, %now, "advance_on_schedule: called");
        self.step(nominal.min(now), now)
    }

    fn step(&mut self, anchor: NaiveDateTime, now: NaiveDateTime) -> Result<Transition, MachineError> {
        if let Some(ctx) = &self.interrupt {
            debug!(saved = %ctx.saved_phase, "advance: refused while interrupted");
            return Err(MachineError::Interrupted { saved: ctx.saved_phase });
        }

        let from = self.phase;
        let to = from.next();

        let archived = if from.wraps() {
            debug!(date = %self.plan.date, "advance: wrapping, archiving plan");
            Some(std::mem::replace(&mut self.plan, DailyPlan::new(now)))
        } else {
            None
        };

        self.phase = to;
        self.entered_at = now;
        self.anchor = anchor;
        self.plan.log_phase(to, now);

        info!(%from, %to, archived = archived.is_some(), "Phase advanced");
        Ok(Transition {
            from,
            to,
            at: now,
            archived,
        })
    }

    /// Enter interrupt mode, remembering the current phase.
    ///
    /// The stored phase is unchanged. If an interrupt is already active its
    /// context is kept, so the original phase is the one restored.
    pub fn enter_interrupt(
        &mut self,
        trigger: &str,
        reason: &str,
        conversation: Vec<Turn>,
        now: NaiveDateTime,
    ) -> &InterruptContext {
        debug!(phase = %self.phase, %reason, "enter_interrupt: called");
        if self.interrupt.is_some() {
            debug!("enter_interrupt: already interrupted, keeping existing context");
        } else {
            info!(phase = %self.phase, %reason, "Entering interrupt mode");
        }
        let phase = self.phase;
        self.interrupt
            .get_or_insert_with(|| InterruptContext::new(phase, trigger, reason, conversation, now))
    }

    /// Leave interrupt mode and return the restored phase
    pub fn resume(&mut self) -> Result<Phase, MachineError> {
        debug!(phase = %self.phase, "resume: called");
        match self.interrupt.take() {
            Some(ctx) => {
                self.phase = ctx.saved_phase;
                info!(phase = %self.phase, "Resumed from interrupt");
                Ok(self.phase)
            }
            None => {
                warn!(phase = %self.phase, "resume: no active interrupt");
                Err(MachineError::TransitionInconsistency { phase: self.phase })
            }
        }
    }
}
