//! Chat front end: commands and free text

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::command::{Command, help_text};
use crate::companion::{AdvanceError, Companion};
use crate::domain::{Phase, Turn};
use crate::engine::{Generated, fallback_reply, fallback_support};
use crate::machine::MachineError;
use crate::scheduler::{ReconfigureError, Scheduler};
use crate::state::StateError;

/// Handles every inbound message and produces the reply
#[derive(Clone)]
pub struct FrontEnd {
    companion: Arc<Companion>,
    scheduler: Scheduler,
}

impl FrontEnd {
    pub fn new(companion: Arc<Companion>) -> Self {
        Self {
            scheduler: Scheduler::new(companion.clone()),
            companion,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Reply to one inbound message.
    ///
    /// Commands are parsed first. While interrupted a resume cue wins; other
    /// free text is checked for urgency before the ordinary reply. An empty
    /// reply means the answer was already delivered.
    pub async fn handle(&self, text: &str, now: NaiveDateTime) -> String {
        let text = text.trim();
        debug!(len = text.len(), "handle: called");
        if text.is_empty() {
            return String::new();
        }

        let result = if text.starts_with('/') {
            match Command::parse(text) {
                Ok(command) => self.command(command, now).await,
                Err(e) => Ok(e.to_string()),
            }
        } else {
            self.message(text, now).await
        };

        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to handle message");
            format!("Sorry, I couldn't save that just now ({}). Please try again in a moment.", e)
        })
    }

    /// Answer inbound messages until the channel closes or shutdown
    pub async fn serve(&self, mut inbound: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        info!("Chat front end started");
        loop {
            tokio::select! {
                message = inbound.recv() => {
                    let Some(message) = message else { break };
                    let reply = self.handle(&message, Local::now().naive_local()).await;
                    if !reply.is_empty() {
                        self.companion.deliver(&reply).await;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Chat front end stopped");
    }

    async fn command(&self, command: Command, now: NaiveDateTime) -> Result<String, StateError> {
        debug!(?command, "command: called");
        match command {
            Command::Start => {
                let state = self.companion.lock().await;
                Ok(format!(
                    "Hi {}! I'm your daily companion. We're in {} right now. Send /help to see what I can do.",
                    state.profile.name,
                    state.machine.phase().title()
                ))
            }
            Command::Help => Ok(help_text()),
            Command::Status => Ok(self.scheduler.status(now).await.describe()),
            Command::Plan => Ok(self.companion.lock().await.machine.plan().summary()),
            Command::PlanHistory(limit) => {
                let plans = self.companion.store().plan_history(limit).await?;
                if plans.is_empty() {
                    return Ok("No past plans yet.".to_string());
                }
                Ok(plans.iter().map(|p| p.summary()).collect::<Vec<_>>().join("\n"))
            }
            Command::Note(text) => {
                let mut state = self.companion.lock().await;
                let mut next = state.clone();
                let phase = next.machine.phase();
                next.machine.plan_mut().add_note(phase, text, now);
                self.companion.commit(&mut state, next, now).await?;
                Ok(format!("Noted under {}.", phase.title()))
            }
            Command::Schedule => {
                let schedule = self.scheduler.schedule().await;
                let enabled = self.scheduler.is_enabled().await;
                Ok(format!(
                    "{}\nScheduler: {}",
                    schedule.describe().trim_end(),
                    if enabled { "running" } else { "stopped" }
                ))
            }
            Command::ScheduleSet { phase, at } => match self.scheduler.reconfigure(phase, at).await {
                Ok(schedule) => Ok(format!("Updated.\n{}", schedule.describe().trim_end())),
                Err(ReconfigureError::Schedule(e)) => Ok(format!("That doesn't fit the day: {}", e)),
                Err(ReconfigureError::State(e)) => Err(e),
            },
            Command::ScheduleGrace(minutes) => match self.scheduler.set_grace(minutes).await {
                Ok(_) => Ok(format!("I'll nudge up to {} minutes after each check-in time.", minutes)),
                Err(ReconfigureError::Schedule(e)) => Ok(e.to_string()),
                Err(ReconfigureError::State(e)) => Err(e),
            },
            Command::ScheduleRemind(minutes) => match self.scheduler.set_reminder(minutes).await {
                Ok(_) => Ok(match minutes {
                    Some(m) => format!("I'll give you a gentle heads-up {} minutes before each check-in.", m),
                    None => "Okay, no more heads-up reminders.".to_string(),
                }),
                Err(ReconfigureError::Schedule(e)) => Ok(e.to_string()),
                Err(ReconfigureError::State(e)) => Err(e),
            },
            Command::StartScheduler => {
                self.scheduler.set_enabled(true, now).await?;
                Ok("Scheduled check-ins are on.".to_string())
            }
            Command::StopScheduler => {
                self.scheduler.set_enabled(false, now).await?;
                Ok("Scheduled check-ins are paused. Use /advance to move on yourself, or /start_scheduler to turn them back on.".to_string())
            }
            Command::Advance => self.advance(now).await,
            Command::Resume => self.resume("I'm ready to continue.", now).await,
            Command::Calendar => {
                let calendar = self.companion.calendar_context(now).await;
                if !calendar.available {
                    return Ok("No calendar is connected.".to_string());
                }
                let mut out = format!("Calendar: {}\n", self.companion.calendar().name());
                out.push_str(&format!("{} event(s) today", calendar.today.len()));
                if let Some(next) = &calendar.next {
                    out.push_str(&format!("\nNext: {}", next.describe()));
                }
                Ok(out)
            }
            Command::Today => {
                let calendar = self.companion.calendar_context(now).await;
                if !calendar.available {
                    return Ok("No calendar is connected.".to_string());
                }
                if calendar.today.is_empty() {
                    return Ok("Nothing on the calendar today.".to_string());
                }
                let lines: Vec<String> = calendar.today.iter().map(|e| format!("- {}", e.describe())).collect();
                Ok(format!("Today:\n{}", lines.join("\n")))
            }
            Command::Next => {
                let calendar = self.companion.calendar_context(now).await;
                if !calendar.available {
                    return Ok("No calendar is connected.".to_string());
                }
                Ok(match calendar.next {
                    Some(event) => format!("Next up: {}", event.describe()),
                    None => "Nothing coming up this week.".to_string(),
                })
            }
            Command::Prefer { key, value } => {
                let mut state = self.companion.lock().await;
                let mut next = state.clone();
                next.profile.set_preference(key.clone(), value);
                self.companion.commit(&mut state, next, now).await?;
                Ok(format!("Got it, I'll remember your {}.", key.replace('_', " ")))
            }
        }
    }

    /// Manual advance. The nudge goes out through the transport here so the
    /// recorded delivery flag is the real one.
    async fn advance(&self, now: NaiveDateTime) -> Result<String, StateError> {
        let advanced = match self.companion.advance(None, now).await {
            Ok(advanced) => advanced,
            Err(AdvanceError::Machine(MachineError::Interrupted { .. })) => {
                return Ok("We're taking a pause right now. Tell me when you're okay, or send /resume.".to_string());
            }
            Err(AdvanceError::State(e)) => return Err(e),
            Err(e) => return Ok(e.to_string()),
        };

        let generated = self.companion.nudge_for(advanced.to, now).await;
        let text = format!("Moving on to {}.\n\n{}", advanced.to.title(), generated.text);
        let delivered = self.companion.deliver(&text).await;
        self.companion
            .record_nudge(advanced.to, &generated, delivered, now)
            .await;
        Ok(String::new())
    }

    async fn resume(&self, message: &str, now: NaiveDateTime) -> Result<String, StateError> {
        let phase = match self.companion.resume(now).await {
            Ok(phase) => phase,
            Err(AdvanceError::Machine(MachineError::TransitionInconsistency { phase })) => {
                return Ok(format!("Nothing to resume, we're in {}.", phase.title()));
            }
            Err(AdvanceError::State(e)) => return Err(e),
            Err(e) => return Ok(e.to_string()),
        };

        let generated = self.companion.resume_message(phase, message, now).await;
        self.companion
            .remember(Turn::user(message, now), Turn::assistant(generated.text.clone(), now), now)
            .await;
        Ok(generated.text)
    }

    async fn message(&self, text: &str, now: NaiveDateTime) -> Result<String, StateError> {
        let (interrupted, urgent) = {
            let state = self.companion.lock().await;
            (state.machine.is_interrupted(), self.companion.policy().urgent(text))
        };

        if interrupted && self.companion.policy().is_resume_cue(text) {
            return self.resume(text, now).await;
        }

        if !interrupted && let Some(reason) = urgent {
            self.interrupt(text, &reason, now).await?;
        }

        let in_support = interrupted || self.companion.lock().await.machine.is_interrupted();
        let generated = if in_support {
            self.support(text, now).await
        } else {
            self.reply(text, now).await
        };

        self.companion
            .remember(Turn::user(text, now), Turn::assistant(generated.text.clone(), now), now)
            .await;
        Ok(generated.text)
    }

    async fn interrupt(&self, text: &str, reason: &str, now: NaiveDateTime) -> Result<Phase, StateError> {
        let mut state = self.companion.lock().await;
        let mut next = state.clone();
        let history = next.conversation.clone();
        let saved = next.machine.enter_interrupt(text, reason, history, now).saved_phase;
        next.profile.record_interrupt();
        self.companion.commit(&mut state, next, now).await?;
        info!(%saved, %reason, "Interrupt started from chat");
        Ok(saved)
    }

    async fn support(&self, text: &str, now: NaiveDateTime) -> Generated {
        let (context, history) = self.companion.prompt_context(now).await;
        match self.companion.prompts().interrupt_prompt(&context) {
            Ok(system) => self.companion.engine().support(&system, &history, text).await,
            Err(e) => {
                warn!(error = %e, "Failed to render interrupt prompt, using fallback");
                Generated {
                    text: fallback_support().to_string(),
                    fallback: true,
                }
            }
        }
    }

    async fn reply(&self, text: &str, now: NaiveDateTime) -> Generated {
        let (context, history) = self.companion.prompt_context(now).await;
        match self.companion.prompts().phase_prompt(context.phase, &context) {
            Ok(system) => self.companion.engine().reply(&system, &history, text).await,
            Err(e) => {
                warn!(error = %e, "Failed to render phase prompt, using fallback");
                Generated {
                    text: fallback_reply().to_string(),
                    fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{CalendarEvent, FileCalendar, NoCalendar};
    use crate::calendar::CalendarSource;
    use crate::chat::mock::MockTransport;
    use crate::companion::{CompanionDeps, CompanionState};
    use crate::domain::{CompanionSnapshot, UserProfile};
    use crate::engine::ConversationEngine;
    use crate::interrupts::InterruptPolicy;
    use crate::prompts::PromptLoader;
    use crate::scheduler::ScheduleConfig;
    use crate::state::StateManager;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    struct Fixture {
        dir: TempDir,
        front: FrontEnd,
        companion: Arc<Companion>,
        transport: Arc<MockTransport>,
    }

    fn fixture_with(phase: Phase, entered_at: NaiveDateTime, calendar: Arc<dyn CalendarSource>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = StateManager::spawn(dir.path(), "u1").unwrap();
        let mut snapshot = CompanionSnapshot::initial(entered_at);
        snapshot.phase = phase;
        let state = CompanionState::from_snapshot(&snapshot, ScheduleConfig::default(), UserProfile::new("u1", "Sam"));
        let transport = Arc::new(MockTransport::new());
        let deps = CompanionDeps {
            store,
            prompts: PromptLoader::embedded_only(),
            engine: ConversationEngine::offline(),
            calendar,
            transport: transport.clone(),
            policy: InterruptPolicy::default(),
        };
        let companion = Companion::new(state, deps);
        Fixture {
            dir,
            front: FrontEnd::new(companion.clone()),
            companion,
            transport,
        }
    }

    fn fixture(phase: Phase, entered_at: NaiveDateTime) -> Fixture {
        fixture_with(phase, entered_at, Arc::new(NoCalendar))
    }

    #[tokio::test]
    async fn test_start_greets_by_name() {
        let f = fixture(Phase::MorningPlanning, at(7, 0));
        let reply = f.front.handle("/start", at(7, 5)).await;
        assert!(reply.contains("Sam"));
        assert!(reply.contains("Morning planning"));
    }

    #[tokio::test]
    async fn test_urgent_message_enters_support_mode() {
        let f = fixture(Phase::EveningCheckin, at(18, 11));
        let reply = f.front.handle("I'm so overwhelmed right now", at(19, 0)).await;
        assert_eq!(reply, fallback_support());

        let state = f.companion.lock().await;
        let ctx = state.machine.interrupt().unwrap();
        assert_eq!(ctx.saved_phase, Phase::EveningCheckin);
        assert_eq!(ctx.reason, "overwhelmed");
        assert_eq!(state.machine.phase(), Phase::EveningCheckin);
        assert_eq!(state.profile.summary.interrupts, 1);
    }

    #[tokio::test]
    async fn test_resume_cue_restores_phase() {
        let f = fixture(Phase::EveningCheckin, at(18, 11));
        f.front.handle("I need help", at(19, 0)).await;
        f.front.handle("still rough", at(19, 5)).await;
        assert!(f.companion.lock().await.machine.is_interrupted());

        let reply = f.front.handle("I'm okay now, thanks", at(19, 30)).await;
        assert!(reply.contains("evening check-in"));
        let state = f.companion.lock().await;
        assert!(!state.machine.is_interrupted());
        assert_eq!(state.machine.phase(), Phase::EveningCheckin);
    }

    #[tokio::test]
    async fn test_command_is_not_treated_as_urgent() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        let reply = f.front.handle("/help", at(13, 20)).await;
        assert!(reply.contains("/status"));
        assert!(!f.companion.lock().await.machine.is_interrupted());
    }

    #[tokio::test]
    async fn test_resume_without_interrupt() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        let reply = f.front.handle("/resume", at(13, 20)).await;
        assert_eq!(reply, "Nothing to resume, we're in Midday check-in.");
    }

    #[tokio::test]
    async fn test_advance_refused_in_support_mode() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        f.front.handle("this is urgent", at(14, 0)).await;
        let reply = f.front.handle("/advance", at(14, 5)).await;
        assert!(reply.contains("/resume"));
        assert_eq!(f.companion.lock().await.machine.phase(), Phase::MiddayCheckin);
    }

    #[tokio::test]
    async fn test_manual_advance_delivers_nudge() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        let reply = f.front.handle("/advance", at(15, 0)).await;
        assert!(reply.is_empty());

        let sent = f.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Moving on to Evening check-in."));

        let state = f.companion.lock().await;
        assert_eq!(state.machine.phase(), Phase::EveningCheckin);
        assert_eq!(state.nudges.len(), 1);
        assert!(state.nudges[0].delivered);
        assert_eq!(state.profile.summary.nudges_sent, 1);
    }

    #[tokio::test]
    async fn test_manual_advance_records_failed_delivery() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        f.transport.set_failing(true);
        f.front.handle("/advance", at(15, 0)).await;

        let state = f.companion.lock().await;
        assert_eq!(state.machine.phase(), Phase::EveningCheckin);
        assert!(!state.nudges[0].delivered);
        assert_eq!(state.profile.summary.nudges_failed, 1);
        assert_eq!(state.profile.summary.nudges_sent, 0);
    }

    #[tokio::test]
    async fn test_note_is_added_to_plan() {
        let f = fixture(Phase::MorningCheckin, at(9, 11));
        let reply = f.front.handle("/note sent the invoices", at(10, 0)).await;
        assert_eq!(reply, "Noted under Morning check-in.");

        let snapshot = f.companion.store().load_snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.plan.notes.len(), 1);
        assert_eq!(snapshot.plan.notes[0].text, "sent the invoices");
    }

    #[tokio::test]
    async fn test_schedule_remind_toggles_reminders() {
        let f = fixture(Phase::MorningPlanning, at(7, 0));
        let reply = f.front.handle("/schedule remind 20", at(7, 5)).await;
        assert!(reply.contains("20 minutes"));
        assert_eq!(f.companion.lock().await.schedule.reminder_minutes, Some(20));
        let saved = f.companion.store().load_schedule().await.unwrap().unwrap();
        assert_eq!(saved.reminder_minutes, Some(20));

        let reply = f.front.handle("/schedule remind 0", at(7, 6)).await;
        assert!(reply.contains("between 1 minute and 12 hours"));

        f.front.handle("/schedule remind off", at(7, 7)).await;
        assert_eq!(f.companion.lock().await.schedule.reminder_minutes, None);
    }

    #[tokio::test]
    async fn test_stop_and_start_scheduler() {
        let f = fixture(Phase::MorningPlanning, at(7, 0));
        f.front.handle("/stop_scheduler", at(7, 5)).await;
        assert!(!f.front.scheduler().is_enabled().await);
        assert!(f.front.scheduler().tick(at(9, 30)).await.is_none());

        f.front.handle("/start_scheduler", at(9, 31)).await;
        assert!(f.front.scheduler().is_enabled().await);
    }

    #[tokio::test]
    async fn test_schedule_set_rejects_out_of_order() {
        let f = fixture(Phase::MorningPlanning, at(7, 0));
        let reply = f.front.handle("/schedule set evening 12:00", at(7, 5)).await;
        assert!(reply.starts_with("That doesn't fit the day"));

        let reply = f.front.handle("/schedule set evening 18:30", at(7, 6)).await;
        assert!(reply.contains("18:30"));
    }

    #[tokio::test]
    async fn test_prefer_updates_profile() {
        let f = fixture(Phase::MorningPlanning, at(7, 0));
        f.front.handle("/prefer communication_style direct", at(7, 5)).await;
        let profile = f.companion.store().load_profile().await.unwrap().unwrap();
        assert_eq!(profile.preference_str("communication_style").as_deref(), Some("direct"));
    }

    #[tokio::test]
    async fn test_free_text_is_remembered() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        let reply = f.front.handle("lunch was good", at(13, 30)).await;
        assert_eq!(reply, fallback_reply());
        let state = f.companion.lock().await;
        assert_eq!(state.conversation.len(), 2);
        assert_eq!(state.profile.summary.messages, 1);
    }

    #[tokio::test]
    async fn test_today_lists_calendar_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.yml");
        let events = vec![CalendarEvent {
            summary: "Dentist".to_string(),
            start: at(15, 0),
            end: None,
            all_day: false,
            location: None,
            description: None,
        }];
        std::fs::write(&path, serde_yaml::to_string(&events).unwrap()).unwrap();

        let f = fixture_with(Phase::MiddayCheckin, at(13, 11), Arc::new(FileCalendar::new(&path)));
        let reply = f.front.handle("/today", at(13, 30)).await;
        assert!(reply.contains("15:00 Dentist"));
        let reply = f.front.handle("/next", at(13, 30)).await;
        assert!(reply.contains("Dentist"));
        drop(f.dir);
    }

    #[tokio::test]
    async fn test_calendar_without_source() {
        let f = fixture(Phase::MiddayCheckin, at(13, 11));
        assert_eq!(f.front.handle("/today", at(13, 30)).await, "No calendar is connected.");
    }
}
