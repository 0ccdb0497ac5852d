//! Read-only calendar access
//!
//! Calendar data only enriches prompts and answers the calendar commands.
//! Any failure degrades to "no calendar context".

mod file;
mod google;
mod source;

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

pub use file::FileCalendar;
pub use google::GoogleCalendar;
pub use source::{CalendarError, CalendarEvent, CalendarSource, NoCalendar};

use crate::config::CalendarConfig;

/// Build the configured calendar source, falling back to `NoCalendar`
pub fn create_calendar(config: &CalendarConfig) -> Arc<dyn CalendarSource> {
    debug!(provider = %config.provider, "create_calendar: called");
    match config.provider.as_str() {
        "file" => match &config.path {
            Some(path) => Arc::new(FileCalendar::new(path)),
            None => {
                warn!("calendar provider 'file' needs calendar.path, calendar disabled");
                Arc::new(NoCalendar)
            }
        },
        "google" => match GoogleCalendar::from_config(config) {
            Ok(cal) => Arc::new(cal),
            Err(e) => {
                warn!(error = %e, "Google calendar unavailable, calendar disabled");
                Arc::new(NoCalendar)
            }
        },
        "none" | "" => Arc::new(NoCalendar),
        other => {
            warn!(provider = %other, "Unknown calendar provider, calendar disabled");
            Arc::new(NoCalendar)
        }
    }
}

/// Calendar facts used when rendering prompts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarContext {
    pub available: bool,
    pub today: Vec<CalendarEvent>,
    pub next: Option<CalendarEvent>,
}

/// Collect today's events and the next event after `now`.
///
/// Errors are logged and produce an unavailable context.
pub async fn gather(source: &dyn CalendarSource, now: NaiveDateTime) -> CalendarContext {
    debug!(source = source.name(), %now, "gather: called");
    if !source.is_available() {
        return CalendarContext::default();
    }

    let start = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);
    let end = start + Duration::days(1);

    let today = match source.events_between(start, end).await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "gather: failed to read today's events");
            return CalendarContext::default();
        }
    };

    let next = match source.next_event_after(now).await {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "gather: failed to read next event");
            None
        }
    };

    CalendarContext {
        available: true,
        today,
        next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_gather_without_calendar_is_unavailable() {
        let ctx = gather(&NoCalendar, chrono::Local::now().naive_local()).await;
        assert!(!ctx.available);
        assert!(ctx.today.is_empty());
    }

    #[tokio::test]
    async fn test_gather_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- summary: Dentist
  start: 2025-03-04T10:00:00
  end: 2025-03-04T11:00:00
- summary: Team sync
  start: 2025-03-04T15:00:00
- summary: Tomorrow thing
  start: 2025-03-05T09:00:00
"#
        )
        .unwrap();

        let cal = FileCalendar::new(file.path());
        let now = chrono::NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let ctx = gather(&cal, now).await;

        assert!(ctx.available);
        assert_eq!(ctx.today.len(), 2);
        assert_eq!(ctx.next.unwrap().summary, "Team sync");
    }

    #[tokio::test]
    async fn test_gather_degrades_on_error() {
        let cal = FileCalendar::new("/nonexistent/nudger/events.yml");
        let ctx = gather(&cal, chrono::Local::now().naive_local()).await;
        assert!(!ctx.available);
    }

    #[test]
    fn test_create_calendar_fallbacks() {
        let config = CalendarConfig {
            provider: "file".to_string(),
            path: None,
            ..Default::default()
        };
        assert!(!create_calendar(&config).is_available());

        let config = CalendarConfig {
            provider: "outlook".to_string(),
            ..Default::default()
        };
        assert!(!create_calendar(&config).is_available());

        assert!(!create_calendar(&CalendarConfig::default()).is_available());
    }
}
