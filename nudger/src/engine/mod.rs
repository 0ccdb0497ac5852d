//! Conversational engine
//!
//! Turns rendered prompts into text through the LLM. Every call has a canned
//! fallback so callers never fail on the model.

mod core;
mod fallback;

pub use core::{ConversationEngine, Generated, HISTORY_TURNS};
pub use fallback::{fallback_nudge, fallback_reply, fallback_resume, fallback_support};
