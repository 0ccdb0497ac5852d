//! Interrupt detection
//!
//! Urgent detection is data (a keyword list) behind a pluggable predicate.
//! Resume happens on an explicit cue or, if configured, after a timeout.

mod policy;

pub use policy::{InterruptPolicy, KeywordPredicate, UrgentPredicate};
