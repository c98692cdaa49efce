//! Turns merge results into chat messages.
//!
//! Messages are markdown: one block per changed event, changed fields shown as
//! `~~old~~ ⟶ new`, plus links the user can click to answer an invitation or
//! delete an event they organize.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use url::Url;

use crate::diff::{ChangeKind, ChangeSummary, EventChange, Field};
use crate::error::{CalMirrorError, CalMirrorResult};
use crate::event::{EventStatus, MirroredEvent, ResponseStatus};

const DATE_FORMAT: &str = "%A, %B %-d, %Y";
const TIME_FORMAT: &str = "%-I:%M %p %Z";
const ARROW: &str = "⟶";

pub struct NotificationComposer {
    base_url: Url,
}

impl NotificationComposer {
    /// `base_url` is the public address the action endpoints are served under.
    pub fn new(base_url: &str) -> CalMirrorResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CalMirrorError::Config(format!("Invalid site URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CalMirrorError::Config(format!(
                "Site URL '{base_url}' cannot carry paths"
            )));
        }
        Ok(NotificationComposer { base_url })
    }

    /// Render every change in batch order. Empty when nothing is worth saying.
    pub fn compose(&self, summary: &ChangeSummary, tz: Tz, now: DateTime<Utc>) -> String {
        summary
            .changes
            .iter()
            .filter_map(|change| self.compose_change(change, tz, now))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn compose_reminder(
        &self,
        event: &MirroredEvent,
        minutes: i64,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> String {
        format!(
            "**_{minutes} minutes until this event:_**\n{}",
            self.event_block(event, tz, now)
        )
    }

    fn compose_change(&self, change: &EventChange, tz: Tz, now: DateTime<Utc>) -> Option<String> {
        match change.kind {
            ChangeKind::Added => Some(format!(
                "**_You've been invited:_**\n{}",
                self.event_block(&change.event, tz, now)
            )),
            ChangeKind::Updated => Some(format!(
                "**_Event Updated:_**\n{}",
                self.change_block(change, tz, now)
            )),
            ChangeKind::Removed => Some(format!(
                "**_Event Cancelled:_**\n{}",
                self.change_block(change, tz, now)
            )),
            ChangeKind::NoChange => None,
        }
    }

    /// Invitation-style description of a single event.
    pub fn event_block(&self, event: &MirroredEvent, tz: Tz, now: DateTime<Utc>) -> String {
        let mut lines = vec![String::new(), format!("**[{}]({})**", event, event.link)];

        if let Some(when) = format_when(event, tz, now) {
            lines.push(format!("**When**: {when}"));
        }
        if let Some(place) = event.place() {
            lines.push(format!("**Where**: {place}"));
        }
        if let Some(guests) = format_guests(event) {
            lines.push(format!("**Guests**: {guests}"));
        }
        lines.push(format!("**Status of Event**: {}", event.status.title_case()));
        lines.extend(self.going_line(event));
        lines.extend(self.delete_line(event));

        lines.join("\n") + "\n"
    }

    /// Like [`Self::event_block`], with changed fields struck through.
    fn change_block(&self, change: &EventChange, tz: Tz, now: DateTime<Utc>) -> String {
        let event = &change.event;
        let previous = change.previous.as_ref().unwrap_or(event);
        let mut lines = vec![String::new()];

        if change.changed(Field::Title) {
            lines.push(format!(
                "**[~~{}~~ {ARROW} {}]({})**",
                previous, event, event.link
            ));
        } else {
            lines.push(format!("**[{}]({})**", event, event.link));
        }

        let when = format_when(event, tz, now);
        if change.changed(Field::When) {
            lines.push(format!(
                "**When**: ~~{}~~ {ARROW} {}",
                format_when(previous, tz, now).unwrap_or_default(),
                when.unwrap_or_default()
            ));
        } else if let Some(when) = when {
            lines.push(format!("**When**: {when}"));
        }

        if let Some(diff) = change.diff(Field::Location) {
            lines.push(format!("**Where**: ~~{}~~ {ARROW} {}", diff.old, diff.new));
        } else if let Some(place) = event.place() {
            lines.push(format!("**Where**: {place}"));
        }

        if change.changed(Field::Guests) {
            lines.push(format!(
                "**Guests**: ~~{}~~ {ARROW} {}",
                format_guests(previous).unwrap_or_default(),
                format_guests(event).unwrap_or_default()
            ));
        } else if let Some(guests) = format_guests(event) {
            lines.push(format!("**Guests**: {guests}"));
        }

        if change.changed(Field::Status) {
            lines.push(format!(
                "**Status of Event**: ~~{}~~ {ARROW} {}",
                previous.status.title_case(),
                event.status.title_case()
            ));
        } else {
            lines.push(format!("**Status of Event**: {}", event.status.title_case()));
        }

        lines.extend(self.going_line(event));
        lines.extend(self.delete_line(event));

        lines.join("\n") + "\n"
    }

    fn going_line(&self, event: &MirroredEvent) -> Option<String> {
        if event.status == EventStatus::Cancelled {
            return None;
        }
        let viewer = event.viewer()?;

        let answer = match viewer.response_status {
            ResponseStatus::NeedsAction => format!(
                "[Yes]({}) | [No]({}) | [Maybe]({})",
                self.response_url(&event.id, ResponseStatus::Accepted),
                self.response_url(&event.id, ResponseStatus::Declined),
                self.response_url(&event.id, ResponseStatus::Tentative),
            ),
            ResponseStatus::Declined => "No".to_string(),
            ResponseStatus::Tentative => "Maybe".to_string(),
            _ => "Yes".to_string(),
        };

        Some(format!("**Going?**: {answer}"))
    }

    fn delete_line(&self, event: &MirroredEvent) -> Option<String> {
        if !event.organizer_self() || event.is_cancelled() {
            return None;
        }
        Some(format!("[Delete Event]({})", self.delete_url(&event.id)))
    }

    pub fn response_url(&self, event_id: &str, response: ResponseStatus) -> Url {
        let mut url = self.endpoint("handleresponse");
        url.query_pairs_mut()
            .append_pair("evtid", event_id)
            .append_pair("response", response.as_str());
        url
    }

    pub fn delete_url(&self, event_id: &str) -> Url {
        let mut url = self.endpoint("delete");
        url.query_pairs_mut().append_pair("evtid", event_id);
        url
    }

    /// Address the remote posts push notifications for `user_id` to.
    pub fn watch_url(&self, user_id: &str) -> Url {
        let mut url = self.endpoint("watch");
        url.query_pairs_mut().append_pair("userId", user_id);
        url
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }
}

/// `Today @ 9:00 AM PST to 10:00 AM PST`, `Tomorrow @ All-day`, ...
fn format_when(event: &MirroredEvent, tz: Tz, now: DateTime<Utc>) -> Option<String> {
    let start_time = event.start.as_ref()?;
    let end_time = event.end.as_ref()?;
    let start = start_time.in_zone(tz)?;
    let end = end_time.in_zone(tz)?;

    let day = relative_day(start.date_naive(), now.with_timezone(&tz).date_naive());

    let at_midnight = |t: &DateTime<Tz>| t.hour() == 0 && t.minute() == 0 && t.second() == 0;
    if start_time.is_date() || (at_midnight(&start) && at_midnight(&end)) {
        return Some(format!("{day} @ All-day"));
    }

    Some(format!(
        "{day} @ {} to {}",
        start.format(TIME_FORMAT),
        end.format(TIME_FORMAT)
    ))
}

fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if Some(date) == today.checked_add_signed(Duration::days(1)) {
        "Tomorrow".to_string()
    } else {
        date.format(DATE_FORMAT).to_string()
    }
}

fn format_guests(event: &MirroredEvent) -> Option<String> {
    if event.attendees.is_empty() {
        return None;
    }
    let organizer = event
        .organizer
        .as_ref()
        .map(|o| o.email.as_str())
        .unwrap_or("unknown");
    Some(format!(
        "{organizer} (Organizer) & {} more",
        event.attendees.len() - 1
    ))
}
