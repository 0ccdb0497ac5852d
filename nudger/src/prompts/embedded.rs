//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");
pub const MORNING_PLANNING: &str = include_str!("../../prompts/morning_planning.pmt");
pub const MORNING_CHECKIN: &str = include_str!("../../prompts/morning_checkin.pmt");
pub const MIDDAY_CHECKIN: &str = include_str!("../../prompts/midday_checkin.pmt");
pub const EVENING_CHECKIN: &str = include_str!("../../prompts/evening_checkin.pmt");
pub const NIGHTTIME_PLANNING: &str = include_str!("../../prompts/nighttime_planning.pmt");

/// Support-mode instructions used while interrupted
pub const INTERRUPT: &str = include_str!("../../prompts/interrupt.pmt");

/// Instructions for picking the day back up after an interrupt
pub const RESUME: &str = include_str!("../../prompts/resume.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "morning_planning" => Some(MORNING_PLANNING),
        "morning_checkin" => Some(MORNING_CHECKIN),
        "midday_checkin" => Some(MIDDAY_CHECKIN),
        "evening_checkin" => Some(EVENING_CHECKIN),
        "nighttime_planning" => Some(NIGHTTIME_PLANNING),
        "interrupt" => Some(INTERRUPT),
        "resume" => Some(RESUME),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
