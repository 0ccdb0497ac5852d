//! Data handed to the prompt templates

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::calendar::CalendarContext;
use crate::domain::{DailyPlan, InterruptContext, Phase, UserProfile};

/// Preferences rendered in their own lines rather than the generic list
const DEDICATED_PREFERENCES: [&str; 2] = ["communication_style", "focus_areas"];

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub name: String,
    pub age: Option<u32>,
    pub condition: Option<String>,
    pub goals: String,
    pub communication_style: String,
    pub focus_areas: String,
    /// Remaining learned preferences as display strings
    pub preferences: BTreeMap<String, String>,

    pub phase: Phase,
    pub phase_title: String,
    /// e.g. "Tuesday, March 4 at 13:00"
    pub now: String,

    pub plan_content: String,
    /// Completion notes as "HH:MM text"
    pub notes: Vec<String>,

    pub has_calendar: bool,
    pub today_events_count: usize,
    pub today_events: Vec<String>,
    pub next_event: Option<String>,

    pub interrupt_reason: Option<String>,
    pub saved_phase_title: Option<String>,
}

impl PromptContext {
    pub fn new(
        profile: &UserProfile,
        plan: &DailyPlan,
        phase: Phase,
        calendar: &CalendarContext,
        now: NaiveDateTime,
    ) -> Self {
        let preferences = profile
            .preferences
            .keys()
            .filter(|k| !DEDICATED_PREFERENCES.contains(&k.as_str()))
            .filter_map(|k| profile.preference_str(k).map(|v| (k.clone(), v)))
            .collect();

        Self {
            name: profile.name.clone(),
            age: profile.age,
            condition: profile.condition.clone(),
            goals: profile.goals.join(", "),
            communication_style: profile
                .preference_str("communication_style")
                .unwrap_or_else(|| "gentle".to_string()),
            focus_areas: profile.preference_str("focus_areas").unwrap_or_default(),
            preferences,
            phase,
            phase_title: phase.title().to_string(),
            now: now.format("%A, %B %-d at %H:%M").to_string(),
            plan_content: plan.content.trim().to_string(),
            notes: plan
                .notes
                .iter()
                .map(|n| format!("{} {}", n.at.format("%H:%M"), n.text))
                .collect(),
            has_calendar: calendar.available,
            today_events_count: calendar.today.len(),
            today_events: calendar.today.iter().map(|e| e.describe()).collect(),
            next_event: calendar.next.as_ref().map(|e| e.describe()),
            interrupt_reason: None,
            saved_phase_title: None,
        }
    }

    /// Add interrupt details for the support-mode template
    pub fn with_interrupt(mut self, ctx: &InterruptContext) -> Self {
        self.interrupt_reason = Some(ctx.reason.clone());
        self.saved_phase_title = Some(ctx.saved_phase.title().to_string());
        self
    }

    /// Opening user message that asks the model for a phase nudge
    pub fn kickoff(&self) -> String {
        let plan = if self.plan_content.is_empty() {
            "nothing planned yet".to_string()
        } else {
            self.plan_content.clone()
        };
        match self.phase {
            Phase::MorningPlanning => {
                let calendar = match (&self.next_event, self.has_calendar) {
                    (Some(next), true) => format!(" First thing on the calendar: {}.", next),
                    _ => String::new(),
                };
                format!("Let's make a gentle plan for today.{}", calendar)
            }
            Phase::MorningCheckin => {
                format!("Good morning! Here's today's plan: {}. How should we start?", plan)
            }
            Phase::MiddayCheckin => {
                let next = self
                    .next_event
                    .as_ref()
                    .map(|e| format!(" Next on the calendar: {}.", e))
                    .unwrap_or_default();
                format!("It's midday. Here's what we planned: {}.{}", plan, next)
            }
            Phase::EveningCheckin => format!("Good evening! Here's what we planned today: {}.", plan),
            Phase::NighttimePlanning => {
                format!("Here's what was planned today: {}. Let's close the day and glance at tomorrow.", plan)
            }
        }
    }
}
