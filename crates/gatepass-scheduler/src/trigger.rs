//! Next occurrence of a local wall-clock trigger.
//!
//! # Design
//! - The result is always strictly after `now`; an instant equal to `now` has
//!   already passed and rolls to the next day.
//! - Days where the local time falls into a DST gap are skipped. Ambiguous
//!   local times (DST fold) resolve to the earlier instant.

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{SchedulerError, SchedulerResult};

const SEARCH_DAYS: u64 = 7;

/// Next instant strictly after `now` at which the wall clock in `timezone` reads `trigger`.
///
/// # Errors
///
/// Returns [`SchedulerError::NoValidInstant`] when no day in the following
/// week has a valid local instant for `trigger`.
pub fn next_trigger(
    now: DateTime<Utc>,
    trigger: NaiveTime,
    timezone: Tz,
) -> SchedulerResult<DateTime<Utc>> {
    let today = now.with_timezone(&timezone).date_naive();
    (0..=SEARCH_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| {
            timezone
                .from_local_datetime(&date.and_time(trigger))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .find(|candidate| *candidate > now)
        .ok_or(SchedulerError::NoValidInstant {
            after: now,
            trigger,
            timezone,
        })
}
