//! GoogleCalendar - Calendar API v3 events list over REST
//!
//! Uses a bearer access token read from the environment. Obtaining and
//! refreshing that token happens outside this process.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::source::{CalendarError, CalendarEvent, CalendarSource};
use crate::config::CalendarConfig;

pub struct GoogleCalendar {
    http: Client,
    api_base: String,
    calendar_id: String,
    token: String,
}

impl GoogleCalendar {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        debug!(calendar_id = %config.calendar_id, "GoogleCalendar::from_config: called");
        let token = std::env::var(&config.token_env).map_err(|_| {
            CalendarError::NotConfigured(format!("set the {} environment variable", config.token_env))
        })?;
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            token,
        })
    }
}

/// Local naive time as RFC 3339 with the local offset
fn to_rfc3339(t: NaiveDateTime) -> String {
    match Local.from_local_datetime(&t).earliest() {
        Some(local) => local.to_rfc3339(),
        None => t.and_utc().to_rfc3339(),
    }
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    summary: Option<String>,
    start: Option<ApiTime>,
    end: Option<ApiTime>,
    location: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiTime {
    /// Local time plus whether this is an all-day date
    fn resolve(&self) -> Option<(NaiveDateTime, bool)> {
        if let Some(dt) = &self.date_time {
            let parsed = DateTime::parse_from_rfc3339(dt).ok()?;
            return Some((parsed.with_timezone(&Local).naive_local(), false));
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        Some((date.and_hms_opt(0, 0, 0)?, true))
    }
}

fn convert(event: ApiEvent) -> Option<CalendarEvent> {
    let (start, all_day) = event.start.as_ref()?.resolve()?;
    let end = event.end.as_ref().and_then(|t| t.resolve()).map(|(t, _)| t);
    Some(CalendarEvent {
        summary: event.summary.unwrap_or_else(|| "No title".to_string()),
        start,
        end,
        all_day,
        location: event.location,
        description: event.description,
    })
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    fn name(&self) -> &str {
        "google"
    }

    async fn events_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!(%start, %end, "GoogleCalendar::events_between: called");
        let url = format!("{}/calendars/{}/events", self.api_base, self.calendar_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("timeMin", to_rfc3339(start)),
                ("timeMax", to_rfc3339(end)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", "50".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "GoogleCalendar::events_between: API error");
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let list: EventList = response
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        Ok(list.items.into_iter().filter_map(convert).collect())
    }
}
