//! CalendarSource trait and event type

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from calendar queries
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Failed to read calendar file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse calendar data: {0}")]
    Parse(String),

    #[error("Calendar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Calendar API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Calendar not configured: {0}")]
    NotConfigured(String),
}

/// One calendar entry in local time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CalendarEvent {
    pub summary: String,
    pub start: NaiveDateTime,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CalendarEvent {
    /// Start time as "HH:MM", or "all day"
    pub fn time_label(&self) -> String {
        if self.all_day {
            "all day".to_string()
        } else {
            self.start.format("%H:%M").to_string()
        }
    }

    /// One-line description for chat output
    pub fn describe(&self) -> String {
        let mut line = format!("{} {}", self.time_label(), self.summary);
        if let Some(location) = &self.location {
            line.push_str(&format!(" ({})", location));
        }
        line
    }

    /// True if the event overlaps [start, end)
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let event_end = self.end.unwrap_or(if self.all_day {
            self.start + Duration::days(1)
        } else {
            self.start
        });
        self.start < end && (event_end > start || self.start >= start)
    }
}

/// Read-only calendar capability
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// False when no calendar is configured
    fn is_available(&self) -> bool {
        true
    }

    /// Events overlapping [start, end), ordered by start time
    async fn events_between(&self, start: NaiveDateTime, end: NaiveDateTime)
    -> Result<Vec<CalendarEvent>, CalendarError>;

    /// First timed event starting after `t` within the next week
    async fn next_event_after(&self, t: NaiveDateTime) -> Result<Option<CalendarEvent>, CalendarError> {
        let events = self.events_between(t, t + Duration::days(7)).await?;
        Ok(events.into_iter().find(|e| e.start > t))
    }
}

/// Calendar that never has events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCalendar;

#[async_trait]
impl CalendarSource for NoCalendar {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn events_between(
        &self,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        Ok(Vec::new())
    }
}
