use chrono::{DateTime, Utc};
use log::warn;

use crate::types::Schedule;

fn parse_bound(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}

/// Whether `now` falls inside the rollout window.
///
/// Fail-open: a bound that does not parse admits the update instead of
/// blocking it indefinitely on bad schedule data. The parse failure is
/// logged so a broken rollout schedule is visible.
#[must_use]
pub fn is_within_window(schedule: &Schedule, now: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (
        parse_bound(&schedule.start_time),
        parse_bound(&schedule.end_time),
    ) else {
        warn!(
            "unparseable rollout window [{} .. {}], admitting update",
            schedule.start_time, schedule.end_time
        );
        return true;
    };

    start <= now && now <= end
}
