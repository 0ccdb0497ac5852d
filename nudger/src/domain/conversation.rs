//! Conversation turns kept for LLM context and interrupt snapshots

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name as the chat completion APIs expect it
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in the running conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: NaiveDateTime,
}

impl Turn {
    pub fn user(text: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at,
        }
    }

    pub fn assistant(text: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at,
        }
    }
}
