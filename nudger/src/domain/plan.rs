//! DailyPlan domain type
//!
//! One mutable plan per day. Created at morning planning, amended through
//! the day, archived when the cycle wraps past nighttime planning.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::Phase;

/// A completion note attached during the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNote {
    pub at: NaiveDateTime,
    pub phase: Phase,
    pub text: String,
}

/// The day's plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    /// Calendar day this plan belongs to
    pub date: NaiveDate,

    /// Planned activities as free text
    #[serde(default)]
    pub content: String,

    /// Completion notes in the order they were added
    #[serde(default)]
    pub notes: Vec<PlanNote>,

    /// When each phase actually occurred
    #[serde(default)]
    pub phase_log: BTreeMap<Phase, NaiveDateTime>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,

    /// What last modified the plan (e.g. "morning_planning", "note")
    #[serde(default)]
    pub update_source: Option<String>,
}

impl DailyPlan {
    /// Empty plan for the day containing `now`
    pub fn new(now: NaiveDateTime) -> Self {
        debug!(date = %now.date(), "DailyPlan::new: called");
        Self {
            date: now.date(),
            content: String::new(),
            notes: Vec::new(),
            phase_log: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            update_source: None,
        }
    }

    /// Stamp the actual occurrence of a phase
    pub fn log_phase(&mut self, phase: Phase, at: NaiveDateTime) {
        debug!(%phase, %at, "log_phase: called");
        self.phase_log.insert(phase, at);
        self.updated_at = at;
    }

    /// Replace the planned activities
    pub fn set_content(&mut self, content: impl Into<String>, source: &str, at: NaiveDateTime) {
        self.content = content.into();
        self.update_source = Some(source.to_string());
        self.updated_at = at;
    }

    pub fn add_note(&mut self, phase: Phase, text: impl Into<String>, at: NaiveDateTime) {
        let text = text.into();
        debug!(%phase, len = text.len(), "add_note: called");
        self.notes.push(PlanNote { at, phase, text });
        self.update_source = Some("note".to_string());
        self.updated_at = at;
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.notes.is_empty()
    }

    /// Multi-line summary for chat output
    pub fn summary(&self) -> String {
        let mut out = format!("Plan for {}\n", self.date.format("%A, %B %-d"));
        if self.content.trim().is_empty() {
            out.push_str("No activities planned yet.\n");
        } else {
            out.push_str(self.content.trim());
            out.push('\n');
        }

        if !self.notes.is_empty() {
            out.push_str("\nNotes:\n");
            for note in &self.notes {
                out.push_str(&format!("- {} ({}): {}\n", note.at.format("%H:%M"), note.phase.title(), note.text));
            }
        }

        if !self.phase_log.is_empty() {
            let done: Vec<String> = self
                .phase_log
                .iter()
                .map(|(phase, at)| format!("{} {}", phase.title(), at.format("%H:%M")))
                .collect();
            out.push_str(&format!("\nPhases so far: {}\n", done.join(", ")));
        }
        out
    }
}
