//! Schedule configuration
//!
//! Per-phase target time-of-day plus grace periods. Loaded once from the
//! config file, then only changed through explicit reconfiguration.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::Phase;

/// Errors from schedule reconfiguration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("{phase} at {at} must be later than {prev_phase} at {prev_at}")]
    OutOfOrder {
        phase: Phase,
        at: String,
        prev_phase: Phase,
        prev_at: String,
    },

    #[error("Grace period must be under 12 hours, got {0} minutes")]
    GraceTooLong(u32),

    #[error("Reminder lead time must be between 1 minute and 12 hours, got {0} minutes")]
    ReminderOutOfRange(u32),
}

/// Target time for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhaseSlot {
    /// Nominal time of day, "HH:MM"
    #[serde(with = "hhmm")]
    pub at: NaiveTime,

    /// Overrides the default grace period for this phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_minutes: Option<u32>,
}

impl PhaseSlot {
    fn at(h: u32, m: u32) -> Self {
        Self {
            at: NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default(),
            grace_minutes: None,
        }
    }
}

/// Schedule configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    #[serde(default = "default_morning_planning")]
    pub morning_planning: PhaseSlot,

    #[serde(default = "default_morning_checkin")]
    pub morning_checkin: PhaseSlot,

    #[serde(default = "default_midday_checkin")]
    pub midday_checkin: PhaseSlot,

    #[serde(default = "default_evening_checkin")]
    pub evening_checkin: PhaseSlot,

    #[serde(default = "default_nighttime_planning")]
    pub nighttime_planning: PhaseSlot,

    /// Default grace period in minutes
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u32,

    /// Seconds between scheduler ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Send a gentle reminder this many minutes before each slot; off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<u32>,
}

fn default_morning_planning() -> PhaseSlot {
    PhaseSlot::at(7, 0)
}

fn default_morning_checkin() -> PhaseSlot {
    PhaseSlot::at(9, 0)
}

fn default_midday_checkin() -> PhaseSlot {
    PhaseSlot::at(13, 0)
}

fn default_evening_checkin() -> PhaseSlot {
    PhaseSlot::at(18, 0)
}

fn default_nighttime_planning() -> PhaseSlot {
    PhaseSlot::at(21, 0)
}

fn default_grace_minutes() -> u32 {
    10
}

fn default_tick_secs() -> u64 {
    60
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            morning_planning: default_morning_planning(),
            morning_checkin: default_morning_checkin(),
            midday_checkin: default_midday_checkin(),
            evening_checkin: default_evening_checkin(),
            nighttime_planning: default_nighttime_planning(),
            grace_minutes: default_grace_minutes(),
            tick_secs: default_tick_secs(),
            reminder_minutes: None,
        }
    }
}

impl ScheduleConfig {
    pub fn slot(&self, phase: Phase) -> &PhaseSlot {
        match phase {
            Phase::MorningPlanning => &self.morning_planning,
            Phase::MorningCheckin => &self.morning_checkin,
            Phase::MiddayCheckin => &self.midday_checkin,
            Phase::EveningCheckin => &self.evening_checkin,
            Phase::NighttimePlanning => &self.nighttime_planning,
        }
    }

    fn slot_mut(&mut self, phase: Phase) -> &mut PhaseSlot {
        match phase {
            Phase::MorningPlanning => &mut self.morning_planning,
            Phase::MorningCheckin => &mut self.morning_checkin,
            Phase::MiddayCheckin => &mut self.midday_checkin,
            Phase::EveningCheckin => &mut self.evening_checkin,
            Phase::NighttimePlanning => &mut self.nighttime_planning,
        }
    }

    /// Nominal time of day for a phase
    pub fn time_for(&self, phase: Phase) -> NaiveTime {
        self.slot(phase).at
    }

    /// Grace period for a phase (override or default)
    pub fn grace_for(&self, phase: Phase) -> Duration {
        let minutes = self.slot(phase).grace_minutes.unwrap_or(self.grace_minutes);
        Duration::minutes(i64::from(minutes))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_secs.max(1))
    }

    /// Move a phase to a new time, rejecting an order that breaks the day
    pub fn set_time(&mut self, phase: Phase, at: NaiveTime) -> Result<(), ScheduleError> {
        debug!(%phase, %at, "set_time: called");
        let mut candidate = self.clone();
        candidate.slot_mut(phase).at = at;
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    pub fn set_grace(&mut self, minutes: u32) -> Result<(), ScheduleError> {
        debug!(minutes, "set_grace: called");
        if minutes >= 12 * 60 {
            return Err(ScheduleError::GraceTooLong(minutes));
        }
        self.grace_minutes = minutes;
        Ok(())
    }

    /// Reminder lead time, if reminders are on
    pub fn reminder_lead(&self) -> Option<Duration> {
        self.reminder_minutes.map(|m| Duration::minutes(i64::from(m)))
    }

    /// Turn reminders on with a lead time, or off with `None`
    pub fn set_reminder(&mut self, minutes: Option<u32>) -> Result<(), ScheduleError> {
        debug!(?minutes, "set_reminder: called");
        if let Some(m) = minutes
            && (m == 0 || m >= 12 * 60)
        {
            return Err(ScheduleError::ReminderOutOfRange(m));
        }
        self.reminder_minutes = minutes;
        Ok(())
    }

    /// Phase times must increase through the day, starting at morning planning
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for pair in Phase::ALL.windows(2) {
            let (prev, phase) = (pair[0], pair[1]);
            if self.time_for(phase) <= self.time_for(prev) {
                debug!(%prev, %phase, "validate: out of order");
                return Err(ScheduleError::OutOfOrder {
                    phase,
                    at: hhmm::format(self.time_for(phase)),
                    prev_phase: prev,
                    prev_at: hhmm::format(self.time_for(prev)),
                });
            }
        }
        for phase in Phase::ALL {
            if let Some(minutes) = self.slot(phase).grace_minutes
                && minutes >= 12 * 60
            {
                return Err(ScheduleError::GraceTooLong(minutes));
            }
        }
        if self.grace_minutes >= 12 * 60 {
            return Err(ScheduleError::GraceTooLong(self.grace_minutes));
        }
        if let Some(m) = self.reminder_minutes
            && (m == 0 || m >= 12 * 60)
        {
            return Err(ScheduleError::ReminderOutOfRange(m));
        }
        Ok(())
    }

    /// One line per phase for chat and CLI output
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for phase in Phase::ALL {
            let grace = self.grace_for(phase).num_minutes();
            out.push_str(&format!(
                "{:<20} {}  (grace {} min)\n",
                phase.title(),
                hhmm::format(self.time_for(phase)),
                grace
            ));
        }
        if let Some(minutes) = self.reminder_minutes {
            out.push_str(&format!("Reminders {} min before each check-in\n", minutes));
        }
        out
    }
}

/// Parse "HH:MM" (also accepts "H:MM")
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| ScheduleError::InvalidTime(s.to_string()))
}

/// Serde adapter for "HH:MM" times
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(t: NaiveTime) -> String {
        t.format("%H:%M").to_string()
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hhmm(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ScheduleConfig::default();
        assert_eq!(config.time_for(Phase::MorningPlanning), t(7, 0));
        assert_eq!(config.time_for(Phase::MorningCheckin), t(9, 0));
        assert_eq!(config.time_for(Phase::MiddayCheckin), t(13, 0));
        assert_eq!(config.time_for(Phase::EveningCheckin), t(18, 0));
        assert_eq!(config.time_for(Phase::NighttimePlanning), t(21, 0));
        assert_eq!(config.grace_for(Phase::MiddayCheckin), Duration::minutes(10));
        assert_eq!(config.tick_interval(), std::time::Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
morning-checkin:
  at: "08:00"
  grace-minutes: 5
grace-minutes: 15
"#;
        let config: ScheduleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.time_for(Phase::MorningCheckin), t(8, 0));
        assert_eq!(config.grace_for(Phase::MorningCheckin), Duration::minutes(5));
        assert_eq!(config.grace_for(Phase::EveningCheckin), Duration::minutes(15));
        assert_eq!(config.time_for(Phase::NighttimePlanning), t(21, 0));
    }

    #[test]
    fn test_bad_time_rejected_by_serde() {
        let yaml = "midday-checkin:\n  at: \"noon\"\n";
        assert!(serde_yaml::from_str::<ScheduleConfig>(yaml).is_err());
    }

    #[test]
    fn test_set_time_rejects_out_of_order() {
        let mut config = ScheduleConfig::default();
        let err = config.set_time(Phase::MiddayCheckin, t(8, 30)).unwrap_err();
        assert!(matches!(err, ScheduleError::OutOfOrder { phase: Phase::MiddayCheckin, .. }));
        assert_eq!(config.time_for(Phase::MiddayCheckin), t(13, 0));

        config.set_time(Phase::MiddayCheckin, t(12, 30)).unwrap();
        assert_eq!(config.time_for(Phase::MiddayCheckin), t(12, 30));
    }

    #[test]
    fn test_set_grace_bounds() {
        let mut config = ScheduleConfig::default();
        config.set_grace(20).unwrap();
        assert_eq!(config.grace_for(Phase::MorningPlanning), Duration::minutes(20));
        assert_eq!(config.set_grace(720), Err(ScheduleError::GraceTooLong(720)));
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("08:05").unwrap(), t(8, 5));
        assert_eq!(parse_hhmm(" 7:30 ").unwrap(), t(7, 30));
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("8am").is_err());
    }

    #[test]
    fn test_reminder_is_opt_in() {
        let config = ScheduleConfig::default();
        assert_eq!(config.reminder_lead(), None);
        assert!(!config.describe().contains("Reminders"));

        let config: ScheduleConfig = serde_yaml::from_str("reminder-minutes: 30\n").unwrap();
        assert_eq!(config.reminder_lead(), Some(Duration::minutes(30)));
        assert!(config.describe().contains("Reminders 30 min"));
    }

    #[test]
    fn test_set_reminder_bounds() {
        let mut config = ScheduleConfig::default();
        assert_eq!(config.set_reminder(Some(0)), Err(ScheduleError::ReminderOutOfRange(0)));
        assert_eq!(config.set_reminder(Some(720)), Err(ScheduleError::ReminderOutOfRange(720)));
        config.set_reminder(Some(45)).unwrap();
        assert!(config.validate().is_ok());
        config.set_reminder(None).unwrap();
        assert_eq!(config.reminder_minutes, None);
    }

    #[test]
    fn test_describe_lists_every_phase() {
        let text = ScheduleConfig::default().describe();
        for phase in Phase::ALL {
            assert!(text.contains(phase.title()));
        }
        assert!(text.contains("13:00"));
    }
}
