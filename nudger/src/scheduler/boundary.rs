//! Boundary arithmetic
//!
//! Pure functions over the schedule: which boundary is pending for the
//! current phase and whether it is due yet. A boundary becomes due only
//! strictly after its nominal time plus the grace period.
//!
//! Pending boundaries are measured from the phase's anchor, its nominal
//! start, so a grace period longer than the gap between two slots cannot
//! hide the following slot.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::domain::{Boundary, Phase};

use super::config::ScheduleConfig;

/// Latest occurrence of `time` at or before `now`
pub fn latest_occurrence(time: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(time);
    if today <= now { today } else { today - Duration::days(1) }
}

/// First occurrence of `time` strictly after `now`
pub fn next_occurrence(time: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(time);
    if today > now { today } else { today + Duration::days(1) }
}

/// The boundary that will move the machine out of `current`, if its slot
/// has started after `since`.
pub fn pending_boundary(
    schedule: &ScheduleConfig,
    current: Phase,
    since: NaiveDateTime,
    now: NaiveDateTime,
) -> Option<Boundary> {
    let target = current.next();
    let nominal = latest_occurrence(schedule.time_for(target), now);
    if nominal > since {
        Some(Boundary { phase: target, at: nominal })
    } else {
        None
    }
}

/// Next boundary out of `current`, whether or not it has started
pub fn upcoming_boundary(
    schedule: &ScheduleConfig,
    current: Phase,
    since: NaiveDateTime,
    now: NaiveDateTime,
) -> Boundary {
    pending_boundary(schedule, current, since, now).unwrap_or_else(|| {
        let target = current.next();
        Boundary {
            phase: target,
            at: next_occurrence(schedule.time_for(target), now),
        }
    })
}

/// Instant after which the boundary may fire
pub fn fires_after(schedule: &ScheduleConfig, boundary: &Boundary) -> NaiveDateTime {
    boundary.at + schedule.grace_for(boundary.phase)
}

/// Due boundary for `current`, if one exists.
///
/// Returns the boundary once `now` is strictly later than nominal + grace.
pub fn due_boundary(
    schedule: &ScheduleConfig,
    current: Phase,
    since: NaiveDateTime,
    now: NaiveDateTime,
) -> Option<Boundary> {
    let boundary = pending_boundary(schedule, current, since, now)?;
    let deadline = fires_after(schedule, &boundary);
    if now > deadline {
        debug!(%boundary, %deadline, "due_boundary: due");
        Some(boundary)
    } else {
        debug!(%boundary, %deadline, "due_boundary: inside grace window");
        None
    }
}

/// The phase the clock says should be active: the one whose slot started
/// most recently.
pub fn expected_boundary(schedule: &ScheduleConfig, now: NaiveDateTime) -> Boundary {
    let mut expected = Boundary {
        phase: Phase::MorningPlanning,
        at: latest_occurrence(schedule.time_for(Phase::MorningPlanning), now),
    };
    for phase in Phase::ALL {
        let at = latest_occurrence(schedule.time_for(phase), now);
        if at > expected.at {
            expected = Boundary { phase, at };
        }
    }
    expected
}
