//! Nudger - daily-cycle companion for people with ADHD
//!
//! Nudger walks the user through five phases every day (morning planning,
//! morning check-in, midday check-in, evening check-in, nighttime planning),
//! sending a short LLM-generated nudge at each scheduled boundary. Urgent
//! messages pause the cycle in a support mode until the user is okay again.
//!
//! # Modules
//!
//! - [`machine`] - Phase state machine with interrupt/resume
//! - [`scheduler`] - Wall-clock boundaries, grace periods, the tick loop
//! - [`companion`] - Shared state and the services around it
//! - [`chat`] - Transports (Telegram, console) and the command front end
//! - [`engine`] - LLM conversation with canned fallbacks
//! - [`state`] - Persistence actor over the JSON store
//! - [`ipc`] - Health socket for the CLI

pub mod calendar;
pub mod chat;
pub mod cli;
pub mod companion;
pub mod config;
pub mod domain;
pub mod engine;
pub mod interrupts;
pub mod ipc;
pub mod llm;
pub mod machine;
pub mod prompts;
pub mod scheduler;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use chat::{ChatTransport, DeliveryError, FrontEnd};
pub use companion::{Companion, CompanionDeps, CompanionState};
pub use config::Config;
pub use domain::{Boundary, CompanionSnapshot, DailyPlan, InterruptContext, Phase, UserProfile};
pub use engine::ConversationEngine;
pub use interrupts::InterruptPolicy;
pub use llm::{LlmClient, LlmError};
pub use machine::{MachineError, PhaseMachine};
pub use scheduler::{DueOutcome, DuePhase, ScheduleConfig, Scheduler, SchedulerStatus};
pub use state::{StateError, StateManager};
