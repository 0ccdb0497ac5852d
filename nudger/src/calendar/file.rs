//! FileCalendar - events from a local YAML file
//!
//! The file is a list of events and is re-read on every query so edits
//! show up without a restart.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::source::{CalendarError, CalendarEvent, CalendarSource};

pub struct FileCalendar {
    path: PathBuf,
}

impl FileCalendar {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_events(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!(path = %self.path.display(), "read_events: called");
        let content = std::fs::read_to_string(&self.path).map_err(|e| CalendarError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_yaml::from_str(&content).map_err(|e| CalendarError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CalendarSource for FileCalendar {
    fn name(&self) -> &str {
        "file"
    }

    async fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut events: Vec<CalendarEvent> = self
            .read_events()?
            .into_iter()
            .filter(|e| e.overlaps(start, end))
            .collect();
        events.sort_by_key(|e| e.start);
        debug!(count = events.len(), "events_between: matched");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    #[tokio::test]
    async fn test_events_sorted_and_filtered() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- summary: Late
  start: 2025-03-04T16:00:00
- summary: Early
  start: 2025-03-04T08:00:00
  location: Home
- summary: Birthday
  start: 2025-03-04T00:00:00
  all-day: true
"#
        )
        .unwrap();

        let cal = FileCalendar::new(file.path());
        let day = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let events = cal
            .events_between(day.and_hms_opt(0, 0, 0).unwrap(), day.and_hms_opt(23, 59, 0).unwrap())
            .await
            .unwrap();
        let names: Vec<_> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(names, vec!["Birthday", "Early", "Late"]);

        let next = cal.next_event_after(day.and_hms_opt(9, 0, 0).unwrap()).await.unwrap();
        assert_eq!(next.unwrap().summary, "Late");
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- summary: [unclosed").unwrap();
        let cal = FileCalendar::new(file.path());
        let now = chrono::Local::now().naive_local();
        assert!(matches!(
            cal.events_between(now, now).await,
            Err(CalendarError::Parse(_))
        ));
    }
}
