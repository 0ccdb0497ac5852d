//! Scheduler implementation

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::boundary::{due_boundary, expected_boundary, fires_after, upcoming_boundary};
use super::config::{ScheduleConfig, ScheduleError, hhmm};
use crate::companion::{AdvanceError, Companion, CompanionState};
use crate::domain::{Boundary, Phase, Turn};
use crate::state::StateError;

/// A boundary handed out by `tick`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuePhase {
    pub phase: Phase,
    pub boundary: Boundary,
    pub reason: String,
}

/// Result of one scheduler pass that did something
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueOutcome {
    /// Landed on `phase`, passing over `missed` on the way
    Advanced {
        phase: Phase,
        missed: Vec<Phase>,
        delivered: bool,
        fallback: bool,
    },
    Skipped {
        reason: String,
    },
    /// Gentle heads-up sent before `phase`'s slot
    Reminded {
        phase: Phase,
        minutes: i64,
        delivered: bool,
    },
}

/// Errors from changing the schedule at runtime
#[derive(Debug, Error)]
pub enum ReconfigureError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Scheduler view reported by `/status` and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub current_phase: Phase,
    pub phase_entered_at: NaiveDateTime,
    pub interrupted: bool,
    pub saved_phase: Option<Phase>,
    pub next_phase: Phase,
    pub next_scheduled_time: NaiveDateTime,
    pub fires_after: NaiveDateTime,
    pub seconds_until_next: i64,
    pub overdue: bool,
    /// Phase whose slot started most recently
    pub expected_phase: Phase,
    /// Current phase matches the clock, allowing for the grace window
    pub on_schedule: bool,
    /// Check-ins passed over today
    #[serde(default)]
    pub missed_today: Vec<Boundary>,
}

impl SchedulerStatus {
    /// Status of `state` as of `now`
    pub fn from_state(state: &CompanionState, now: NaiveDateTime) -> Self {
        let phase = state.machine.phase();
        let anchor = state.machine.anchor();
        let next = upcoming_boundary(&state.schedule, phase, anchor, now);
        let overdue = due_boundary(&state.schedule, phase, anchor, now).is_some();
        let expected = expected_boundary(&state.schedule, now);
        let on_schedule = phase == expected.phase
            || (phase == expected.phase.prev() && now <= fires_after(&state.schedule, &expected));

        Self {
            enabled: state.enabled,
            current_phase: phase,
            phase_entered_at: state.machine.entered_at(),
            interrupted: state.machine.is_interrupted(),
            saved_phase: state.machine.interrupt().map(|ctx| ctx.saved_phase),
            next_phase: next.phase,
            next_scheduled_time: next.at,
            fires_after: fires_after(&state.schedule, &next),
            seconds_until_next: (next.at - now).num_seconds().max(0),
            overdue,
            expected_phase: expected.phase,
            on_schedule,
            missed_today: state.missed_on(now),
        }
    }

    pub fn time_until_next(&self) -> Duration {
        Duration::seconds(self.seconds_until_next)
    }

    /// Multi-line text for chat and the terminal
    pub fn describe(&self) -> String {
        let mut out = format!("Current phase: {}\n", self.current_phase.title());
        if self.interrupted {
            out.push_str("Support mode is active");
            if let Some(saved) = self.saved_phase {
                out.push_str(&format!(" (we'll return to {})", saved.title()));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "Scheduler: {}\n",
            if self.enabled { "running" } else { "stopped" }
        ));

        let wait = self.time_until_next();
        let when = if self.overdue {
            "overdue".to_string()
        } else if wait.num_minutes() >= 60 {
            format!("in {}h {}m", wait.num_hours(), wait.num_minutes() % 60)
        } else {
            format!("in {}m", wait.num_minutes().max(0))
        };
        out.push_str(&format!(
            "Next: {} at {} ({})",
            self.next_phase.title(),
            hhmm::format(self.next_scheduled_time.time()),
            when
        ));
        if !self.on_schedule {
            out.push_str(&format!("\nThe clock says {} by now", self.expected_phase.title()));
        }
        if !self.missed_today.is_empty() {
            let missed: Vec<String> = self
                .missed_today
                .iter()
                .map(|b| format!("{} ({})", b.phase.title(), hhmm::format(b.at.time())))
                .collect();
            out.push_str(&format!("\nMissed today: {}", missed.join(", ")));
        }
        out
    }
}

/// Drives phase transitions from the clock
#[derive(Clone)]
pub struct Scheduler {
    companion: Arc<Companion>,
}

impl Scheduler {
    pub fn new(companion: Arc<Companion>) -> Self {
        Self { companion }
    }

    /// Check the clock. Returns the boundary to act on, at most once per
    /// boundary, and nothing while disabled or interrupted.
    pub async fn tick(&self, now: NaiveDateTime) -> Option<DuePhase> {
        let mut state = self.companion.lock().await;
        if !state.enabled {
            debug!("tick: scheduler disabled");
            return None;
        }
        if state.machine.is_interrupted() {
            debug!("tick: interrupted, suppressing transitions");
            return None;
        }

        let boundary = due_boundary(&state.schedule, state.machine.phase(), state.machine.anchor(), now)?;
        if state.last_fired == Some(boundary) {
            debug!(%boundary, "tick: already fired");
            return None;
        }
        state.last_fired = Some(boundary);

        let late = (now - boundary.at).num_minutes();
        Some(DuePhase {
            phase: boundary.phase,
            boundary,
            reason: format!("{} slot passed {} min ago", boundary.phase, late),
        })
    }

    /// Act on a due phase: advance and persist under the lock, then generate
    /// and deliver the nudge without it. Delivery failure never undoes the
    /// transition. Only the phase landed on gets a nudge.
    pub async fn on_due(&self, due: &DuePhase, now: NaiveDateTime) -> Result<DueOutcome, StateError> {
        debug!(phase = %due.phase, boundary = %due.boundary, "on_due: called");
        let advanced = match self.companion.advance(Some(due.boundary), now).await {
            Ok(advanced) => advanced,
            Err(AdvanceError::Stale { reason, .. }) => {
                info!(boundary = %due.boundary, %reason, "Skipping stale boundary");
                return Ok(DueOutcome::Skipped { reason });
            }
            Err(AdvanceError::Machine(e)) => {
                info!(boundary = %due.boundary, error = %e, "Skipping boundary");
                return Ok(DueOutcome::Skipped { reason: e.to_string() });
            }
            Err(AdvanceError::State(e)) => return Err(e),
        };

        if !advanced.missed.is_empty() {
            warn!(missed = advanced.missed.len(), phase = %advanced.to, "Caught up past missed check-ins");
        }

        let generated = self.companion.nudge_for(advanced.to, now).await;
        let delivered = self.companion.deliver(&generated.text).await;
        self.companion
            .record_nudge(advanced.to, &generated, delivered, now)
            .await;

        info!(phase = %advanced.to, delivered, fallback = generated.fallback, "Scheduled nudge handled");
        Ok(DueOutcome::Advanced {
            phase: advanced.to,
            missed: advanced.missed.iter().map(|b| b.phase).collect(),
            delivered,
            fallback: generated.fallback,
        })
    }

    /// Send a gentle reminder when the next slot is close, at most once per
    /// boundary. Off unless the schedule sets a reminder lead time.
    pub async fn remind(&self, now: NaiveDateTime) -> Option<DueOutcome> {
        let (boundary, minutes) = {
            let mut state = self.companion.lock().await;
            let lead = state.schedule.reminder_lead()?;
            if !state.enabled || state.machine.is_interrupted() {
                return None;
            }

            let boundary = upcoming_boundary(&state.schedule, state.machine.phase(), state.machine.anchor(), now);
            if boundary.at <= now || boundary.at - now > lead {
                return None;
            }
            if state.last_reminded == Some(boundary) {
                debug!(%boundary, "remind: already reminded");
                return None;
            }
            state.last_reminded = Some(boundary);
            let minutes = (boundary.at - now).num_minutes().max(1);
            (boundary, minutes)
        };

        let text = format!(
            "Gentle reminder: your {} is coming up in {} minutes. No pressure!",
            boundary.phase.title().to_lowercase(),
            minutes
        );
        let delivered = self.companion.deliver(&text).await;
        self.companion.record_reminder(boundary, &text, delivered, now).await;

        info!(%boundary, minutes, delivered, "Reminder handled");
        Some(DueOutcome::Reminded {
            phase: boundary.phase,
            minutes,
            delivered,
        })
    }

    pub async fn set_enabled(&self, enabled: bool, now: NaiveDateTime) -> Result<(), StateError> {
        debug!(enabled, "set_enabled: called");
        let mut state = self.companion.lock().await;
        if state.enabled == enabled {
            return Ok(());
        }
        let mut next = state.clone();
        next.enabled = enabled;
        self.companion.commit(&mut state, next, now).await?;
        info!(enabled, "Scheduler toggled");
        Ok(())
    }

    pub async fn is_enabled(&self) -> bool {
        self.companion.lock().await.enabled
    }

    pub async fn status(&self, now: NaiveDateTime) -> SchedulerStatus {
        let state = self.companion.lock().await;
        SchedulerStatus::from_state(&state, now)
    }

    /// Leave interrupt mode once the configured timeout has passed
    pub async fn expire_interrupt(&self, now: NaiveDateTime) -> Result<Option<Phase>, StateError> {
        let expired = {
            let state = self.companion.lock().await;
            state
                .machine
                .interrupt()
                .is_some_and(|ctx| self.companion.policy().should_auto_resume(ctx, now))
        };
        if !expired {
            return Ok(None);
        }

        let phase = match self.companion.resume(now).await {
            Ok(phase) => phase,
            Err(AdvanceError::State(e)) => return Err(e),
            Err(e) => {
                debug!(error = %e, "expire_interrupt: nothing to resume");
                return Ok(None);
            }
        };
        info!(%phase, "Interrupt timed out, resuming");

        let cue = "It's been a while, let's check back in.";
        let generated = self.companion.resume_message(phase, cue, now).await;
        self.companion.deliver(&generated.text).await;
        let mut state = self.companion.lock().await;
        state.push_turn(Turn::assistant(generated.text, now));
        Ok(Some(phase))
    }

    /// Move one phase's slot and persist the override
    pub async fn reconfigure(&self, phase: Phase, at: NaiveTime) -> Result<ScheduleConfig, ReconfigureError> {
        debug!(%phase, %at, "reconfigure: called");
        let mut state = self.companion.lock().await;
        let mut schedule = state.schedule.clone();
        schedule.set_time(phase, at)?;
        self.companion.store().save_schedule(schedule.clone()).await?;
        state.schedule = schedule.clone();
        info!(%phase, at = %hhmm::format(at), "Schedule updated");
        Ok(schedule)
    }

    pub async fn set_grace(&self, minutes: u32) -> Result<ScheduleConfig, ReconfigureError> {
        debug!(minutes, "set_grace: called");
        let mut state = self.companion.lock().await;
        let mut schedule = state.schedule.clone();
        schedule.set_grace(minutes)?;
        self.companion.store().save_schedule(schedule.clone()).await?;
        state.schedule = schedule.clone();
        info!(minutes, "Grace period updated");
        Ok(schedule)
    }

    pub async fn set_reminder(&self, minutes: Option<u32>) -> Result<ScheduleConfig, ReconfigureError> {
        debug!(?minutes, "set_reminder: called");
        let mut state = self.companion.lock().await;
        let mut schedule = state.schedule.clone();
        schedule.set_reminder(minutes)?;
        self.companion.store().save_schedule(schedule.clone()).await?;
        state.schedule = schedule.clone();
        info!(?minutes, "Reminder lead time updated");
        Ok(schedule)
    }

    pub async fn schedule(&self) -> ScheduleConfig {
        self.companion.lock().await.schedule.clone()
    }

    /// One scheduler pass: auto-resume, then tick and act, else remind
    pub async fn run_once(&self, now: NaiveDateTime) -> Option<DueOutcome> {
        if let Err(e) = self.expire_interrupt(now).await {
            warn!(error = %e, "Failed to auto-resume interrupt");
        }

        let Some(due) = self.tick(now).await else {
            return self.remind(now).await;
        };
        info!(phase = %due.phase, boundary = %due.boundary, reason = %due.reason, "Phase due");
        match self.on_due(&due, now).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(phase = %due.phase, error = %e, "Failed to advance, will retry next tick");
                None
            }
        }
    }

    /// Tick on the configured interval until shutdown is signalled
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.schedule().await.tick_interval();
        info!(?period, "Scheduler started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once(Local::now().naive_local()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Scheduler stopped");
    }
}
