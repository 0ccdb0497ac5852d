//! Slash command parsing

use chrono::NaiveTime;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Phase;
use crate::scheduler::parse_hhmm;

/// Plans listed by `/plan history` when no count is given
pub const DEFAULT_PLAN_HISTORY: usize = 3;

/// A parsed chat command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Status,
    Plan,
    PlanHistory(usize),
    Note(String),
    Schedule,
    ScheduleSet { phase: Phase, at: NaiveTime },
    ScheduleGrace(u32),
    /// Reminder lead time in minutes, `None` turns reminders off
    ScheduleRemind(Option<u32>),
    StartScheduler,
    StopScheduler,
    Advance,
    Resume,
    Calendar,
    Today,
    Next,
    Prefer { key: String, value: Value },
}

/// A command that could not be parsed, with the usage line to show
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("I don't know {0}. Try /help.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),
}

impl Command {
    /// Parse a message starting with `/`. A `@botname` suffix on the
    /// command word is ignored.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let (word, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let rest = rest.trim();
        let word = word.split('@').next().unwrap_or(word).to_lowercase();
        let args: Vec<&str> = rest.split_whitespace().collect();

        match word.as_str() {
            "/start" => Ok(Self::Start),
            "/help" | "/h" => Ok(Self::Help),
            "/status" => Ok(Self::Status),
            "/plan" => match args.as_slice() {
                [] => Ok(Self::Plan),
                ["history"] => Ok(Self::PlanHistory(DEFAULT_PLAN_HISTORY)),
                ["history", n] => n
                    .parse()
                    .map(Self::PlanHistory)
                    .map_err(|_| CommandError::Usage("/plan history [count]")),
                _ => Err(CommandError::Usage("/plan [history [count]]")),
            },
            "/note" => {
                if rest.is_empty() {
                    Err(CommandError::Usage("/note <what you did>"))
                } else {
                    Ok(Self::Note(rest.to_string()))
                }
            }
            "/schedule" => parse_schedule(&args),
            "/start_scheduler" => Ok(Self::StartScheduler),
            "/stop_scheduler" => Ok(Self::StopScheduler),
            "/advance" | "/next_phase" => Ok(Self::Advance),
            "/resume" => Ok(Self::Resume),
            "/calendar" => Ok(Self::Calendar),
            "/today" => Ok(Self::Today),
            "/next" => Ok(Self::Next),
            "/prefer" => {
                let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let value = value.trim();
                if key.is_empty() || value.is_empty() {
                    return Err(CommandError::Usage("/prefer <key> <value>"));
                }
                Ok(Self::Prefer {
                    key: key.to_lowercase(),
                    value: parse_value(value),
                })
            }
            _ => Err(CommandError::Unknown(word)),
        }
    }
}

fn parse_schedule(args: &[&str]) -> Result<Command, CommandError> {
    const SET_USAGE: &str = "/schedule set <phase> <HH:MM>";
    const GRACE_USAGE: &str = "/schedule grace <minutes>";
    const REMIND_USAGE: &str = "/schedule remind <minutes|off>";

    match args {
        [] => Ok(Command::Schedule),
        ["set", phase, at] => {
            let phase: Phase = phase.parse().map_err(|e: crate::domain::ParsePhaseError| CommandError::Invalid(e.to_string()))?;
            let at = parse_hhmm(at).map_err(|e| CommandError::Invalid(e.to_string()))?;
            Ok(Command::ScheduleSet { phase, at })
        }
        ["set", ..] => Err(CommandError::Usage(SET_USAGE)),
        ["grace", minutes] => minutes
            .parse()
            .map(Command::ScheduleGrace)
            .map_err(|_| CommandError::Usage(GRACE_USAGE)),
        ["grace", ..] => Err(CommandError::Usage(GRACE_USAGE)),
        ["remind", "off"] => Ok(Command::ScheduleRemind(None)),
        ["remind", minutes] => minutes
            .parse()
            .map(|m| Command::ScheduleRemind(Some(m)))
            .map_err(|_| CommandError::Usage(REMIND_USAGE)),
        ["remind", ..] => Err(CommandError::Usage(REMIND_USAGE)),
        _ => Err(CommandError::Usage(
            "/schedule [set <phase> <HH:MM> | grace <minutes> | remind <minutes|off>]",
        )),
    }
}

/// JSON when it parses (numbers, booleans, lists), otherwise a plain string
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if !value.is_string() => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Text for `/help`
pub fn help_text() -> String {
    [
        "Here's what I understand:",
        "/status - where we are in the day",
        "/plan - today's plan (/plan history for past days)",
        "/note <text> - note something you did",
        "/schedule - show check-in times",
        "/schedule set <phase> <HH:MM> - move a check-in",
        "/schedule grace <minutes> - how late I may nudge",
        "/schedule remind <minutes|off> - heads-up before each check-in",
        "/start_scheduler, /stop_scheduler - turn scheduled nudges on or off",
        "/advance - move to the next phase now",
        "/resume - leave support mode",
        "/calendar, /today, /next - calendar info",
        "/prefer <key> <value> - remember a preference",
        "",
        "Or just talk to me. If things get hard, tell me and we'll pause the plan.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("/status"), Ok(Command::Status));
        assert_eq!(Command::parse("  /help "), Ok(Command::Help));
        assert_eq!(Command::parse("/status@NudgerBot"), Ok(Command::Status));
        assert_eq!(Command::parse("/START"), Ok(Command::Start));
        assert_eq!(Command::parse("/stop_scheduler"), Ok(Command::StopScheduler));
    }

    #[test]
    fn test_parse_note_keeps_text() {
        assert_eq!(
            Command::parse("/note  finished the report draft"),
            Ok(Command::Note("finished the report draft".to_string()))
        );
        assert_eq!(Command::parse("/note"), Err(CommandError::Usage("/note <what you did>")));
    }

    #[test]
    fn test_parse_schedule_set() {
        assert_eq!(
            Command::parse("/schedule set midday 12:30"),
            Ok(Command::ScheduleSet {
                phase: Phase::MiddayCheckin,
                at: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
            })
        );
        assert!(matches!(
            Command::parse("/schedule set lunch 12:30"),
            Err(CommandError::Invalid(_))
        ));
        assert!(matches!(
            Command::parse("/schedule set midday 25:00"),
            Err(CommandError::Invalid(_))
        ));
        assert_eq!(Command::parse("/schedule grace 15"), Ok(Command::ScheduleGrace(15)));
        assert!(matches!(Command::parse("/schedule grace soon"), Err(CommandError::Usage(_))));
        assert_eq!(Command::parse("/schedule remind 30"), Ok(Command::ScheduleRemind(Some(30))));
        assert_eq!(Command::parse("/schedule remind off"), Ok(Command::ScheduleRemind(None)));
        assert!(matches!(Command::parse("/schedule remind"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_parse_plan_history() {
        assert_eq!(Command::parse("/plan"), Ok(Command::Plan));
        assert_eq!(
            Command::parse("/plan history"),
            Ok(Command::PlanHistory(DEFAULT_PLAN_HISTORY))
        );
        assert_eq!(Command::parse("/plan history 7"), Ok(Command::PlanHistory(7)));
    }

    #[test]
    fn test_parse_prefer_values() {
        assert_eq!(
            Command::parse("/prefer communication_style direct"),
            Ok(Command::Prefer {
                key: "communication_style".to_string(),
                value: Value::from("direct"),
            })
        );
        assert_eq!(
            Command::parse("/prefer reminder_frequency 3"),
            Ok(Command::Prefer {
                key: "reminder_frequency".to_string(),
                value: Value::from(3),
            })
        );
        assert_eq!(
            Command::parse("/prefer wake_time 07:30 on weekdays"),
            Ok(Command::Prefer {
                key: "wake_time".to_string(),
                value: Value::from("07:30 on weekdays"),
            })
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            Command::parse("/dance now"),
            Err(CommandError::Unknown("/dance".to_string()))
        );
    }
}
