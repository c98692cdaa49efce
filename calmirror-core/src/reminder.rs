//! Selection of events starting soon.

use chrono::{DateTime, Duration, Utc};

use crate::event::{EventTime, MirroredEvent, ResponseStatus};
use crate::state::EventMirror;

/// Events starting exactly `minutes` from `now`, to the minute, that the user
/// is going to. All-day events have no start time and are never due, and
/// neither is anything when `now + minutes` is out of range.
pub fn due_reminders(mirror: &EventMirror, now: DateTime<Utc>, minutes: i64) -> Vec<&MirroredEvent> {
    let Some(target) = Duration::try_minutes(minutes)
        .and_then(|lead| now.checked_add_signed(lead))
        .map(minute_of)
    else {
        return Vec::new();
    };

    mirror
        .events()
        .iter()
        .filter(|event| !event.is_cancelled() && is_attending(event))
        .filter(|event| match &event.start {
            Some(EventTime::DateTime(start)) => minute_of(start.with_timezone(&Utc)) == target,
            _ => false,
        })
        .collect()
}

fn is_attending(event: &MirroredEvent) -> bool {
    event.creator_self
        || event
            .viewer()
            .is_some_and(|v| v.response_status != ResponseStatus::Declined)
}

fn minute_of(t: DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(60)
}
