//! Phase of the daily cycle
//!
//! The five phases form a fixed cycle. `next()` is total: nighttime
//! planning wraps back to morning planning of the next day.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// One of the five named stages of the day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Lay out the day
    #[default]
    MorningPlanning,
    /// First check on how the plan is going
    MorningCheckin,
    /// Midday energy and focus check
    MiddayCheckin,
    /// Review of the day so far
    EveningCheckin,
    /// Reflect and prepare tomorrow
    NighttimePlanning,
}

impl Phase {
    /// Cycle order, starting from the initial phase
    pub const ALL: [Phase; 5] = [
        Phase::MorningPlanning,
        Phase::MorningCheckin,
        Phase::MiddayCheckin,
        Phase::EveningCheckin,
        Phase::NighttimePlanning,
    ];

    /// Deterministic successor in the cycle
    pub fn next(self) -> Phase {
        match self {
            Self::MorningPlanning => Self::MorningCheckin,
            Self::MorningCheckin => Self::MiddayCheckin,
            Self::MiddayCheckin => Self::EveningCheckin,
            Self::EveningCheckin => Self::NighttimePlanning,
            Self::NighttimePlanning => Self::MorningPlanning,
        }
    }

    /// Predecessor in the cycle
    pub fn prev(self) -> Phase {
        match self {
            Self::MorningPlanning => Self::NighttimePlanning,
            Self::MorningCheckin => Self::MorningPlanning,
            Self::MiddayCheckin => Self::MorningCheckin,
            Self::EveningCheckin => Self::MiddayCheckin,
            Self::NighttimePlanning => Self::EveningCheckin,
        }
    }

    /// True when advancing from this phase starts a new day
    pub fn wraps(self) -> bool {
        self == Self::NighttimePlanning
    }

    /// Snake-case identifier, also used as the template name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MorningPlanning => "morning_planning",
            Self::MorningCheckin => "morning_checkin",
            Self::MiddayCheckin => "midday_checkin",
            Self::EveningCheckin => "evening_checkin",
            Self::NighttimePlanning => "nighttime_planning",
        }
    }

    /// Human readable title for chat output
    pub fn title(self) -> &'static str {
        match self {
            Self::MorningPlanning => "Morning planning",
            Self::MorningCheckin => "Morning check-in",
            Self::MiddayCheckin => "Midday check-in",
            Self::EveningCheckin => "Evening check-in",
            Self::NighttimePlanning => "Nighttime planning",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a phase name is not recognized
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown phase '{0}' (expected one of: morning_planning, morning_checkin, midday_checkin, evening_checkin, nighttime_planning)")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(input = %s, "Phase::from_str: called");
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "morning_planning" | "morning" => Ok(Self::MorningPlanning),
            "morning_checkin" | "morning_check_in" => Ok(Self::MorningCheckin),
            "midday_checkin" | "midday_check_in" | "midday" => Ok(Self::MiddayCheckin),
            "evening_checkin" | "evening_check_in" | "evening" => Ok(Self::EveningCheckin),
            "nighttime_planning" | "nighttime" | "night" => Ok(Self::NighttimePlanning),
            _ => {
                debug!(%normalized, "Phase::from_str: no match");
                Err(ParsePhaseError(s.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_successor_follows_cycle() {
        assert_eq!(Phase::MorningPlanning.next(), Phase::MorningCheckin);
        assert_eq!(Phase::MorningCheckin.next(), Phase::MiddayCheckin);
        assert_eq!(Phase::MiddayCheckin.next(), Phase::EveningCheckin);
        assert_eq!(Phase::EveningCheckin.next(), Phase::NighttimePlanning);
        assert_eq!(Phase::NighttimePlanning.next(), Phase::MorningPlanning);
    }

    #[test]
    fn test_prev_inverts_next() {
        for phase in Phase::ALL {
            assert_eq!(phase.next().prev(), phase);
        }
    }

    #[test]
    fn test_only_nighttime_wraps() {
        let wrapping: Vec<_> = Phase::ALL.into_iter().filter(|p| p.wraps()).collect();
        assert_eq!(wrapping, vec![Phase::NighttimePlanning]);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Phase::EveningCheckin).unwrap();
        assert_eq!(json, "\"evening_checkin\"");
        let parsed: Phase = serde_json::from_str("\"nighttime_planning\"").unwrap();
        assert_eq!(parsed, Phase::NighttimePlanning);
    }

    #[test]
    fn test_from_str_variants() {
        assert_eq!("morning_checkin".parse::<Phase>().unwrap(), Phase::MorningCheckin);
        assert_eq!("Midday Check-in".parse::<Phase>().unwrap(), Phase::MiddayCheckin);
        assert_eq!("evening-checkin".parse::<Phase>().unwrap(), Phase::EveningCheckin);
        assert!("lunch".parse::<Phase>().is_err());
    }

    #[test]
    fn test_display_matches_serde_name() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json.trim_matches('"'), phase.to_string());
        }
    }

    fn any_phase() -> impl Strategy<Value = Phase> {
        (0usize..5).prop_map(|i| Phase::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_five_steps_close_the_cycle(start in any_phase()) {
            let mut phase = start;
            for _ in 0..5 {
                phase = phase.next();
            }
            prop_assert_eq!(phase, start);
        }

        #[test]
        fn prop_fewer_steps_never_close(start in any_phase(), steps in 1usize..5) {
            let mut phase = start;
            for _ in 0..steps {
                phase = phase.next();
            }
            prop_assert_ne!(phase, start);
        }
    }
}
