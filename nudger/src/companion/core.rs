//! Companion implementation

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::CompanionState;
use crate::calendar::{self, CalendarContext, CalendarSource};
use crate::chat::ChatTransport;
use crate::config::UserConfig;
use crate::domain::{Boundary, CompanionSnapshot, NudgeRecord, Phase, Turn, UserProfile};
use crate::engine::{ConversationEngine, Generated, fallback_nudge, fallback_resume};
use crate::interrupts::InterruptPolicy;
use crate::machine::MachineError;
use crate::prompts::{PromptContext, PromptLoader};
use crate::scheduler::{ScheduleConfig, due_boundary};
use crate::state::{StateError, StateManager};

/// Why an advance did not happen
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("Boundary {boundary} no longer applies: {reason}")]
    Stale { boundary: Boundary, reason: String },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Result of a successful companion advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advanced {
    pub from: Phase,
    pub to: Phase,
    pub at: NaiveDateTime,
    /// Check-ins passed over while catching up, oldest first
    pub missed: Vec<Boundary>,
}

/// Collaborators handed to the companion at startup
pub struct CompanionDeps {
    pub store: StateManager,
    pub prompts: PromptLoader,
    pub engine: ConversationEngine,
    pub calendar: Arc<dyn CalendarSource>,
    pub transport: Arc<dyn ChatTransport>,
    pub policy: InterruptPolicy,
}

/// Shared companion: state behind one lock plus the services around it.
///
/// The lock is held across persistence but never across LLM calls, calendar
/// queries or message delivery.
pub struct Companion {
    state: Mutex<CompanionState>,
    store: StateManager,
    prompts: PromptLoader,
    engine: ConversationEngine,
    calendar: Arc<dyn CalendarSource>,
    transport: Arc<dyn ChatTransport>,
    policy: InterruptPolicy,
}

impl Companion {
    pub fn new(state: CompanionState, deps: CompanionDeps) -> Arc<Self> {
        debug!(phase = %state.machine.phase(), enabled = state.enabled, "Companion::new: called");
        Arc::new(Self {
            state: Mutex::new(state),
            store: deps.store,
            prompts: deps.prompts,
            engine: deps.engine,
            calendar: deps.calendar,
            transport: deps.transport,
            policy: deps.policy,
        })
    }

    /// Restore from the store, falling back to a fresh start for anything
    /// missing or unreadable.
    pub async fn restore(
        deps: CompanionDeps,
        user: &UserConfig,
        schedule: ScheduleConfig,
        now: NaiveDateTime,
    ) -> Result<Arc<Self>, StateError> {
        debug!(user_id = %user.id, %now, "Companion::restore: called");
        let snapshot = match deps.store.load_snapshot().await {
            Ok(Some(snapshot)) => {
                info!(phase = %snapshot.phase, interrupted = snapshot.interrupt.is_some(), "Restored snapshot");
                snapshot
            }
            Ok(None) => {
                info!("No snapshot found, starting in morning planning");
                CompanionSnapshot::initial(now)
            }
            Err(StateError::DeserializationError(e)) => {
                warn!(error = %e, "Snapshot unreadable, starting in morning planning");
                CompanionSnapshot::initial(now)
            }
            Err(e) => return Err(e),
        };

        let schedule = match deps.store.load_schedule().await {
            Ok(Some(saved)) => match saved.validate() {
                Ok(()) => {
                    debug!("Companion::restore: using saved schedule overrides");
                    saved
                }
                Err(e) => {
                    warn!(error = %e, "Saved schedule invalid, using configured schedule");
                    schedule
                }
            },
            Ok(None) => schedule,
            Err(StateError::DeserializationError(e)) => {
                warn!(error = %e, "Saved schedule unreadable, using configured schedule");
                schedule
            }
            Err(e) => return Err(e),
        };

        let profile = match deps.store.load_profile().await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                info!(user_id = %user.id, "Creating user profile");
                let profile = profile_from_config(user, now);
                deps.store.save_profile(profile.clone()).await?;
                profile
            }
            Err(StateError::DeserializationError(e)) => {
                warn!(error = %e, "Profile unreadable, recreating from config");
                let profile = profile_from_config(user, now);
                deps.store.save_profile(profile.clone()).await?;
                profile
            }
            Err(e) => return Err(e),
        };

        let state = CompanionState::from_snapshot(&snapshot, schedule, profile);
        Ok(Self::new(state, deps))
    }

    pub async fn lock(&self) -> MutexGuard<'_, CompanionState> {
        self.state.lock().await
    }

    pub fn store(&self) -> &StateManager {
        &self.store
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn prompts(&self) -> &PromptLoader {
        &self.prompts
    }

    pub fn calendar(&self) -> &dyn CalendarSource {
        self.calendar.as_ref()
    }

    pub fn transport(&self) -> &dyn ChatTransport {
        self.transport.as_ref()
    }

    pub fn policy(&self) -> &InterruptPolicy {
        &self.policy
    }

    /// Persist `next` and make it the live state.
    ///
    /// On error the live state is left exactly as it was.
    pub(crate) async fn commit(
        &self,
        live: &mut CompanionState,
        next: CompanionState,
        now: NaiveDateTime,
    ) -> Result<(), StateError> {
        debug!(phase = %next.machine.phase(), "commit: called");
        self.store.save_profile(next.profile.clone()).await?;
        self.store.save_snapshot(next.snapshot(now)).await?;
        *live = next;
        Ok(())
    }

    /// Best-effort save of bookkeeping that does not change the phase
    async fn persist(&self, state: &CompanionState, now: NaiveDateTime) {
        if let Err(e) = self.store.save_profile(state.profile.clone()).await {
            warn!(error = %e, "Failed to save profile");
        }
        if let Err(e) = self.store.save_snapshot(state.snapshot(now)).await {
            warn!(error = %e, "Failed to save snapshot");
        }
    }

    /// Advance one phase.
    ///
    /// With `expected` set (scheduler path) the advance only happens when the
    /// machine still sits in the boundary's predecessor and its anchor lies
    /// before the boundary. The machine then keeps walking through any later
    /// slots that are already past their grace window, recording each phase
    /// it passes over as missed, so it lands on the phase the clock expects.
    /// A wrapped plan is archived before the snapshot is saved; archiving is
    /// idempotent so a retry after a failed save leaves one history entry.
    pub async fn advance(&self, expected: Option<Boundary>, now: NaiveDateTime) -> Result<Advanced, AdvanceError> {
        debug!(?expected, %now, "advance: called");
        let mut state = self.state.lock().await;

        if let Some(saved) = state.machine.interrupt().map(|ctx| ctx.saved_phase) {
            return Err(MachineError::Interrupted { saved }.into());
        }
        if let Some(boundary) = expected {
            check_expected(&state, boundary)?;
        }

        let mut next = state.clone();
        let from = next.machine.phase();
        let mut archived = Vec::new();
        let mut missed = Vec::new();
        match expected {
            Some(boundary) => {
                archived.extend(next.machine.advance_on_schedule(boundary.at, now)?.archived);
                next.last_fired = Some(boundary);

                // At most one full lap behind the boundary just taken
                for _ in 1..Phase::ALL.len() {
                    let Some(passed) =
                        due_boundary(&next.schedule, next.machine.phase(), next.machine.anchor(), now)
                    else {
                        break;
                    };
                    let skipped = Boundary {
                        phase: next.machine.phase(),
                        at: next.machine.anchor(),
                    };
                    info!(missed = %skipped, "Catching up past missed check-in");
                    missed.push(skipped);
                    next.push_missed(skipped);
                    archived.extend(next.machine.advance_on_schedule(passed.at, now)?.archived);
                    next.last_fired = Some(passed);
                }
            }
            None => archived.extend(next.machine.advance(now)?.archived),
        }
        let to = next.machine.phase();

        let mut saved = Ok(());
        for plan in archived {
            saved = self.store.archive_plan(plan).await;
            if saved.is_err() {
                break;
            }
        }
        let saved = match saved {
            Ok(()) => self.commit(&mut state, next, now).await,
            Err(e) => Err(e),
        };

        if let Err(e) = saved {
            error!(%from, %to, error = %e, "Failed to persist transition, staying put");
            if expected.is_some() {
                // Let the next tick retry the same boundary
                state.last_fired = None;
            }
            return Err(e.into());
        }

        Ok(Advanced {
            from,
            to,
            at: now,
            missed,
        })
    }

    /// Record a gentle reminder for an upcoming boundary.
    ///
    /// Unlike a nudge it never touches the plan.
    pub async fn record_reminder(&self, boundary: Boundary, text: &str, delivered: bool, now: NaiveDateTime) {
        debug!(%boundary, delivered, "record_reminder: called");
        let mut state = self.state.lock().await;
        state.push_nudge(NudgeRecord {
            id: Uuid::now_v7(),
            at: now,
            phase: boundary.phase,
            text: text.to_string(),
            delivered,
            fallback: true,
        });
        state.profile.record_nudge(delivered);
        state.push_turn(Turn::assistant(text, now));
        self.persist(&state, now).await;
    }

    /// Leave interrupt mode and persist the restored phase
    pub async fn resume(&self, now: NaiveDateTime) -> Result<Phase, AdvanceError> {
        debug!(%now, "resume: called");
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let phase = next.machine.resume()?;
        self.commit(&mut state, next, now).await?;
        Ok(phase)
    }

    /// Prompt context for the current state plus the recent conversation
    pub async fn prompt_context(&self, now: NaiveDateTime) -> (PromptContext, Vec<Turn>) {
        let (profile, plan, phase, interrupt, history) = {
            let state = self.state.lock().await;
            (
                state.profile.clone(),
                state.machine.plan().clone(),
                state.machine.phase(),
                state.machine.interrupt().cloned(),
                state.conversation.clone(),
            )
        };

        let calendar = self.calendar_context(now).await;
        let mut context = PromptContext::new(&profile, &plan, phase, &calendar, now);
        if let Some(ctx) = &interrupt {
            context = context.with_interrupt(ctx);
        }
        (context, history)
    }

    pub async fn calendar_context(&self, now: NaiveDateTime) -> CalendarContext {
        calendar::gather(self.calendar.as_ref(), now).await
    }

    /// Generate the proactive message for `phase`
    pub async fn nudge_for(&self, phase: Phase, now: NaiveDateTime) -> Generated {
        debug!(%phase, "nudge_for: called");
        let (context, _) = self.prompt_context(now).await;
        match self.prompts.phase_prompt(phase, &context) {
            Ok(system) => self.engine.nudge(phase, &system, &context.kickoff()).await,
            Err(e) => {
                warn!(%phase, error = %e, "Failed to render phase prompt, using fallback");
                Generated {
                    text: fallback_nudge(phase).to_string(),
                    fallback: true,
                }
            }
        }
    }

    /// Generate the welcome-back message after leaving support mode
    pub async fn resume_message(&self, phase: Phase, message: &str, now: NaiveDateTime) -> Generated {
        debug!(%phase, "resume_message: called");
        let (context, history) = self.prompt_context(now).await;
        let fallback = fallback_resume(phase);
        match self.prompts.resume_prompt(&context) {
            Ok(system) => self.engine.generate(&system, &history, message, &fallback).await,
            Err(e) => {
                warn!(error = %e, "Failed to render resume prompt, using fallback");
                Generated { text: fallback, fallback: true }
            }
        }
    }

    /// Send a message, logging failures. Returns whether it was delivered.
    pub async fn deliver(&self, text: &str) -> bool {
        match self.transport.send(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(transport = self.transport.name(), error = %e, "Message delivery failed");
                false
            }
        }
    }

    /// Record a proactive message after the delivery attempt
    pub async fn record_nudge(&self, phase: Phase, generated: &Generated, delivered: bool, now: NaiveDateTime) {
        debug!(%phase, delivered, fallback = generated.fallback, "record_nudge: called");
        let mut state = self.state.lock().await;
        state.push_nudge(NudgeRecord {
            id: Uuid::now_v7(),
            at: now,
            phase,
            text: generated.text.clone(),
            delivered,
            fallback: generated.fallback,
        });
        state.profile.record_nudge(delivered);

        if phase == Phase::MorningPlanning
            && !generated.fallback
            && state.machine.phase() == phase
            && state.machine.plan().content.trim().is_empty()
        {
            debug!("record_nudge: storing morning plan");
            state
                .machine
                .plan_mut()
                .set_content(generated.text.clone(), "morning_planning", now);
        }

        state.push_turn(Turn::assistant(generated.text.clone(), now));
        self.persist(&state, now).await;
    }

    /// Record one user message and the reply to it
    pub async fn remember(&self, message: Turn, reply: Turn, now: NaiveDateTime) {
        let mut state = self.state.lock().await;
        state.profile.record_message(message.at);
        state.push_turn(message);
        state.push_turn(reply);
        self.persist(&state, now).await;
    }
}

fn check_expected(state: &CompanionState, boundary: Boundary) -> Result<(), AdvanceError> {
    let current = state.machine.phase();
    let reason = if current == boundary.phase {
        Some(format!("already in {}", current))
    } else if current != boundary.phase.prev() {
        Some(format!("current phase {} does not precede {}", current, boundary.phase))
    } else if state.machine.anchor() >= boundary.at {
        Some(format!("{} started after the boundary", current))
    } else {
        None
    };

    match reason {
        Some(reason) => {
            debug!(%boundary, %reason, "check_expected: stale");
            Err(AdvanceError::Stale { boundary, reason })
        }
        None => Ok(()),
    }
}

fn profile_from_config(user: &UserConfig, now: NaiveDateTime) -> UserProfile {
    let mut profile = UserProfile::new(&user.id, &user.name);
    profile.age = user.age;
    profile.condition = user.condition.clone();
    profile.goals = user.goals.clone();
    profile.created_at = now;
    profile.updated_at = now;
    profile
}
