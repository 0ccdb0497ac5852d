//! Canned messages used when the model is unavailable

use crate::domain::Phase;

/// Phase nudge used when generation fails
pub fn fallback_nudge(phase: Phase) -> &'static str {
    match phase {
        Phase::MorningPlanning => {
            "Good morning! Let's start gently today. What's one thing you'd like to focus on?"
        }
        Phase::MorningCheckin => {
            "Good morning! How are you feeling as the day gets going? We're taking it one small step at a time."
        }
        Phase::MiddayCheckin => {
            "Hi! Just checking in at midday. How are you doing? A short break and some water might feel good."
        }
        Phase::EveningCheckin => {
            "Good evening! How was your day? Take a moment to notice what you got done, however small."
        }
        Phase::NighttimePlanning => "Thank you for today. Rest well, and we'll start fresh tomorrow.",
    }
}

/// Reply to an urgent message when generation fails
pub fn fallback_support() -> &'static str {
    "I hear you, and I'm here. Let's take one slow breath together. What do you need most right now?"
}

/// Message sent when normal flow picks back up
pub fn fallback_resume(phase: Phase) -> String {
    format!(
        "I'm glad you're feeling steadier. Whenever you're ready, we can pick things back up with the {}.",
        phase.title().to_lowercase()
    )
}

/// Reply to ordinary chat when generation fails
pub fn fallback_reply() -> &'static str {
    "Thanks for telling me. I'm having trouble finding words right now, but I'm still here with you."
}
