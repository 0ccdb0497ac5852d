//! Urgent predicate and interrupt policy

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::config::InterruptConfig;
use crate::domain::InterruptContext;

/// Decides whether inbound text is urgent
pub trait UrgentPredicate: Send + Sync {
    /// The matched reason, or `None` when the text is not urgent
    fn matches(&self, text: &str) -> Option<String>;
}

/// Case-insensitive substring match against a keyword set
#[derive(Debug, Clone)]
pub struct KeywordPredicate {
    keywords: Vec<String>,
}

impl KeywordPredicate {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }
}

impl UrgentPredicate for KeywordPredicate {
    fn matches(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        let hit = self.keywords.iter().find(|k| lowered.contains(k.as_str())).cloned();
        if let Some(keyword) = &hit {
            debug!(%keyword, "KeywordPredicate::matches: urgent keyword found");
        }
        hit
    }
}

/// How interrupts start and end
pub struct InterruptPolicy {
    predicate: Box<dyn UrgentPredicate>,
    resume_cues: Vec<String>,
    auto_resume_after: Option<Duration>,
}

impl InterruptPolicy {
    pub fn from_config(config: &InterruptConfig) -> Self {
        debug!(keywords = config.keywords.len(), auto_resume = ?config.auto_resume_minutes, "InterruptPolicy::from_config: called");
        Self {
            predicate: Box::new(KeywordPredicate::new(&config.keywords)),
            resume_cues: config
                .resume_cues
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            auto_resume_after: config.auto_resume_minutes.map(|m| Duration::minutes(i64::from(m))),
        }
    }

    /// Replace the urgent predicate
    pub fn with_predicate(mut self, predicate: Box<dyn UrgentPredicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Reason the text is urgent, if it is
    pub fn urgent(&self, text: &str) -> Option<String> {
        self.predicate.matches(text)
    }

    /// Whether the text asks to resume normal flow
    pub fn is_resume_cue(&self, text: &str) -> bool {
        let lowered = text.to_lowercase().replace('\u{2019}', "'");
        self.resume_cues.iter().any(|c| lowered.contains(c.as_str()))
    }

    pub fn auto_resume_after(&self) -> Option<Duration> {
        self.auto_resume_after
    }

    /// True once the configured timeout has elapsed since the interrupt began
    pub fn should_auto_resume(&self, ctx: &InterruptContext, now: NaiveDateTime) -> bool {
        match self.auto_resume_after {
            Some(after) => now >= ctx.entered_at + after,
            None => false,
        }
    }
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self::from_config(&InterruptConfig::default())
    }
}
