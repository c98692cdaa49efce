//! Provider-neutral event types.
//!
//! Providers convert their API responses into these types. The mirror is a JSON
//! array of [`MirroredEvent`] and every diff and notification is computed from them.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A calendar event as stored in the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Cancelled tombstones from an incremental feed may carry no times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Organizer>,
    /// The syncing user created this event.
    #[serde(default)]
    pub creator_self: bool,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Link to the event in the remote calendar UI.
    #[serde(default)]
    pub link: String,
    /// Video call URL, shown when there is no physical location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    pub email: String,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub email: String,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub response_status: ResponseStatus,
}

/// An attendee's answer to an invitation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    #[serde(other)]
    Other,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::NeedsAction => "needsAction",
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::Other => "other",
        }
    }

    /// Parse a response submitted through an action link.
    /// Only the three answers a user can give are accepted.
    pub fn from_answer(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(ResponseStatus::Accepted),
            "declined" => Some(ResponseStatus::Declined),
            "tentative" => Some(ResponseStatus::Tentative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "confirmed",
            EventStatus::Tentative => "tentative",
            EventStatus::Cancelled => "cancelled",
        }
    }

    /// Capitalized form used in notifications.
    pub fn title_case(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "Confirmed",
            EventStatus::Tentative => "Tentative",
            EventStatus::Cancelled => "Cancelled",
        }
    }
}

/// Start or end of an event: either a timed instant or an all-day date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventTime {
    /// Normalized string used to order events.
    ///
    /// Timed values become UTC RFC 3339 so offsets don't affect ordering; dates stay
    /// `YYYY-MM-DD`, which sorts before any time on the same day.
    pub fn sort_key(&self) -> String {
        match self {
            EventTime::DateTime(dt) => dt
                .with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// True when both values denote the same moment, regardless of offset.
    pub fn same_instant(&self, other: &EventTime) -> bool {
        match (self, other) {
            (EventTime::DateTime(a), EventTime::DateTime(b)) => a == b,
            (EventTime::Date(a), EventTime::Date(b)) => a == b,
            _ => false,
        }
    }

    pub fn in_zone(&self, tz: Tz) -> Option<DateTime<Tz>> {
        match self {
            EventTime::DateTime(dt) => Some(dt.with_timezone(&tz)),
            EventTime::Date(d) => tz
                .from_local_datetime(&d.and_hms_opt(0, 0, 0)?)
                .earliest(),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl MirroredEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    pub fn organizer_self(&self) -> bool {
        self.organizer.as_ref().is_some_and(|o| o.is_self)
    }

    /// The attendee entry describing the syncing user, if invited.
    pub fn viewer(&self) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.is_self)
    }

    pub fn viewer_mut(&mut self) -> Option<&mut Attendee> {
        self.attendees.iter_mut().find(|a| a.is_self)
    }

    pub fn start_key(&self) -> String {
        self.start
            .as_ref()
            .map(EventTime::sort_key)
            .unwrap_or_default()
    }

    /// Physical location, falling back to the conference link.
    pub fn place(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.conference_link.as_deref())
    }

    pub fn location_text(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

impl fmt::Display for MirroredEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "(No title)")
        } else {
            write!(f, "{}", self.title)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_normalizes_offsets() {
        let a = EventTime::DateTime(
            DateTime::parse_from_rfc3339("2025-03-20T10:00:00+02:00").unwrap(),
        );
        let b = EventTime::DateTime(DateTime::parse_from_rfc3339("2025-03-20T09:00:00Z").unwrap());

        assert!(a.sort_key() < b.sort_key());
        assert_eq!(a.sort_key(), "2025-03-20T08:00:00Z");
    }

    #[test]
    fn dates_sort_before_times_on_same_day() {
        let date = EventTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        let timed = EventTime::DateTime(DateTime::parse_from_rfc3339("2025-03-20T00:00:00Z").unwrap());

        assert!(date.sort_key() < timed.sort_key());
    }

    #[test]
    fn same_instant_ignores_offset() {
        let a = EventTime::DateTime(
            DateTime::parse_from_rfc3339("2025-03-20T10:00:00+02:00").unwrap(),
        );
        let b = EventTime::DateTime(DateTime::parse_from_rfc3339("2025-03-20T08:00:00Z").unwrap());

        assert!(a.same_instant(&b));
    }

    #[test]
    fn unknown_response_status_decodes_as_other() {
        let attendee: Attendee =
            serde_json::from_str(r#"{"email":"a@example.com","responseStatus":"delegated"}"#)
                .unwrap();

        assert_eq!(attendee.response_status, ResponseStatus::Other);
        assert!(!attendee.is_self);
    }

    #[test]
    fn event_roundtrips_through_mirror_layout() {
        let json = r#"{
            "id": "abc",
            "title": "Standup",
            "start": {"dateTime": "2025-03-20T09:00:00Z"},
            "end": {"dateTime": "2025-03-20T09:15:00Z"},
            "status": "confirmed",
            "organizer": {"email": "boss@example.com", "isSelf": false},
            "attendees": [{"email": "me@example.com", "isSelf": true, "responseStatus": "needsAction"}],
            "link": "https://calendar.example.com/abc"
        }"#;

        let event: MirroredEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.viewer().unwrap().response_status, ResponseStatus::NeedsAction);
        assert!(!event.organizer_self());
        assert_eq!(event.start_key(), "2025-03-20T09:00:00Z");

        let back: MirroredEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back, event);
    }
}
