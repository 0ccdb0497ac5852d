//! UserProfile domain type
//!
//! Identity, learned preferences and a running summary of interactions.
//! Created with defaults on first use and never deleted.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Counters describing how the user has interacted with the companion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionSummary {
    /// Inbound messages handled
    pub messages: u64,
    /// Interrupts entered
    pub interrupts: u64,
    /// Scheduled nudges delivered
    pub nudges_sent: u64,
    /// Scheduled nudges the transport rejected
    pub nudges_failed: u64,
    /// Last inbound message time
    pub last_interaction: Option<NaiveDateTime>,
}

/// The single user of this companion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,

    /// Learned behavioral preferences (name -> value)
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,

    #[serde(default)]
    pub summary: InteractionSummary,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserProfile {
    /// Create a profile with the stock preferences
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let user_id = user_id.into();
        debug!(%user_id, "UserProfile::new: called");
        let now = Local::now().naive_local();

        let mut preferences = BTreeMap::new();
        preferences.insert("communication_style".to_string(), Value::from("gentle"));
        preferences.insert("reminder_frequency".to_string(), Value::from("moderate"));
        preferences.insert(
            "focus_areas".to_string(),
            Value::from(vec!["time_management", "task_completion", "emotional_regulation"]),
        );

        Self {
            user_id,
            name: name.into(),
            age: None,
            condition: Some("ADHD".to_string()),
            goals: vec![
                "improve daily routine".to_string(),
                "better time management".to_string(),
                "reduce overwhelm".to_string(),
            ],
            preferences,
            summary: InteractionSummary::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record or replace a learned preference
    pub fn set_preference(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        debug!(%key, %value, "set_preference: called");
        self.preferences.insert(key, value);
        self.touch();
    }

    /// Preference as plain text, if present
    pub fn preference_str(&self, key: &str) -> Option<String> {
        self.preferences.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        })
    }

    /// Count an inbound message
    pub fn record_message(&mut self, at: NaiveDateTime) {
        self.summary.messages += 1;
        self.summary.last_interaction = Some(at);
        self.updated_at = at;
    }

    pub fn record_interrupt(&mut self) {
        self.summary.interrupts += 1;
        self.touch();
    }

    /// Count a scheduled nudge by delivery outcome
    pub fn record_nudge(&mut self, delivered: bool) {
        if delivered {
            self.summary.nudges_sent += 1;
        } else {
            debug!("record_nudge: nudge was not delivered");
            self.summary.nudges_failed += 1;
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Local::now().naive_local();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_has_default_preferences() {
        let profile = UserProfile::new("u1", "Alex");
        assert_eq!(profile.user_id, "u1");
        assert_eq!(profile.preference_str("communication_style").as_deref(), Some("gentle"));
        assert_eq!(
            profile.preference_str("focus_areas").as_deref(),
            Some("time_management, task_completion, emotional_regulation")
        );
        assert_eq!(profile.summary, InteractionSummary::default());
    }

    #[test]
    fn test_set_preference_overwrites() {
        let mut profile = UserProfile::new("u1", "Alex");
        profile.set_preference("communication_style", Value::from("direct"));
        assert_eq!(profile.preference_str("communication_style").as_deref(), Some("direct"));
    }

    #[test]
    fn test_interaction_counters() {
        let mut profile = UserProfile::new("u1", "Alex");
        let at = chrono::NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        profile.record_message(at);
        profile.record_message(at);
        profile.record_interrupt();
        profile.record_nudge(true);
        profile.record_nudge(false);

        assert_eq!(profile.summary.messages, 2);
        assert_eq!(profile.summary.interrupts, 1);
        assert_eq!(profile.summary.nudges_sent, 1);
        assert_eq!(profile.summary.nudges_failed, 1);
        assert_eq!(profile.summary.last_interaction, Some(at));
    }

    #[test]
    fn test_profile_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "user_id": "u1",
            "name": "Alex",
            "created_at": "2025-03-04T07:00:00",
            "updated_at": "2025-03-04T07:00:00"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert!(profile.preferences.is_empty());
        assert!(profile.goals.is_empty());
    }
}
