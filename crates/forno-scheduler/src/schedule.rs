use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SchedulerError};
use crate::types::Trigger;

/// Longest accepted interval (about 100 years).
const MAX_INTERVAL_SECS: u64 = 100 * 366 * 24 * 3600;

/// The next occurrence of a trigger after a run, plus how many grid points
/// were passed over to get there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextRun {
    pub at: DateTime<Utc>,
    pub skipped: u32,
}

/// Reject triggers the engine cannot schedule.
pub fn validate(trigger: &Trigger) -> Result<()> {
    match trigger {
        Trigger::At { .. } => Ok(()),
        Trigger::Every { every_secs, .. } => {
            if *every_secs == 0 {
                Err(SchedulerError::InvalidTrigger(
                    "interval must be at least one second".into(),
                ))
            } else if *every_secs > MAX_INTERVAL_SECS {
                Err(SchedulerError::InvalidTrigger(format!(
                    "interval of {every_secs}s is too large"
                )))
            } else {
                Ok(())
            }
        }
    }
}

/// When a freshly registered job is first due.
pub fn first_due(trigger: &Trigger) -> DateTime<Utc> {
    match trigger {
        Trigger::At { at } => *at,
        Trigger::Every { starts, .. } => *starts,
    }
}

/// Compute the occurrence that follows `due` once the job has run at `now`.
///
/// Recurring triggers stay on their grid: the result is `due + k * interval`
/// for the smallest `k` putting it strictly after `now`, so late execution
/// never shifts later occurrences. Returns `None` for `At` triggers, which
/// have no further occurrence.
pub fn next_after(trigger: &Trigger, due: DateTime<Utc>, now: DateTime<Utc>) -> Option<NextRun> {
    match trigger {
        Trigger::At { .. } => None,
        Trigger::Every { every_secs, .. } => {
            let interval_ms = (*every_secs as i64).saturating_mul(1000).max(1);
            let late_ms = (now - due).num_milliseconds().max(0);
            let steps = late_ms / interval_ms + 1;
            Some(NextRun {
                at: due + Duration::milliseconds(steps * interval_ms),
                skipped: (steps - 1).clamp(0, u32::MAX as i64) as u32,
            })
        }
    }
}

/// First grid point at or after `now`. Used when a recurring job is
/// re-enabled: occurrences that fell inside the disabled window are not
/// replayed.
pub fn next_on_or_after(trigger: &Trigger, now: DateTime<Utc>) -> DateTime<Utc> {
    match trigger {
        Trigger::At { at } => *at,
        Trigger::Every { every_secs, starts } => {
            if now <= *starts {
                return *starts;
            }
            let interval_ms = (*every_secs as i64).saturating_mul(1000).max(1);
            let elapsed_ms = (now - *starts).num_milliseconds();
            let steps = (elapsed_ms + interval_ms - 1) / interval_ms;
            *starts + Duration::milliseconds(steps * interval_ms)
        }
    }
}
