//! Conversion between Calendar v3 bodies and mirrored events.

use calmirror_core::{Attendee, EventStatus, EventTime, MirroredEvent, Organizer, ResponseStatus};

use crate::wire::{EventPatch, GoogleAttendee, GoogleEvent, GoogleTime};

pub trait FromGoogle {
    fn from_google(event: GoogleEvent) -> Self;
}

pub trait ToGoogle {
    fn to_google(&self) -> EventPatch;
}

impl FromGoogle for MirroredEvent {
    fn from_google(event: GoogleEvent) -> Self {
        let conference_link = event.hangout_link.clone().or_else(|| {
            event.conference_data.as_ref().and_then(|cd| {
                cd.entry_points
                    .iter()
                    .find(|ep| ep.entry_point_type == "video")
                    .map(|ep| ep.uri.clone())
            })
        });

        MirroredEvent {
            id: event.id,
            title: event.summary.unwrap_or_default(),
            start: event.start.as_ref().and_then(event_time),
            end: event.end.as_ref().and_then(event_time),
            location: event.location.filter(|l| !l.is_empty()),
            status: match event.status.as_deref() {
                Some("cancelled") => EventStatus::Cancelled,
                Some("tentative") => EventStatus::Tentative,
                _ => EventStatus::Confirmed,
            },
            organizer: event.organizer.map(|o| Organizer {
                email: o.email,
                is_self: o.is_self,
            }),
            creator_self: event.creator.is_some_and(|c| c.is_self),
            attendees: event
                .attendees
                .into_iter()
                .map(|a| Attendee {
                    email: a.email,
                    is_self: a.is_self,
                    response_status: response_status(a.response_status.as_deref()),
                })
                .collect(),
            link: event.html_link.unwrap_or_default(),
            conference_link,
        }
    }
}

impl ToGoogle for MirroredEvent {
    fn to_google(&self) -> EventPatch {
        EventPatch {
            summary: self.title.clone(),
            location: self.location.clone(),
            status: self.status.as_str(),
            attendees: self
                .attendees
                .iter()
                .map(|a| GoogleAttendee {
                    email: a.email.clone(),
                    is_self: a.is_self,
                    organizer: self.organizer.as_ref().is_some_and(|o| o.email == a.email),
                    response_status: Some(a.response_status.as_str().to_string()),
                    ..GoogleAttendee::default()
                })
                .collect(),
        }
    }
}

fn event_time(time: &GoogleTime) -> Option<EventTime> {
    time.date_time
        .map(EventTime::DateTime)
        .or_else(|| time.date.map(EventTime::Date))
}

fn response_status(status: Option<&str>) -> ResponseStatus {
    match status {
        None | Some("needsAction") => ResponseStatus::NeedsAction,
        Some("accepted") => ResponseStatus::Accepted,
        Some("declined") => ResponseStatus::Declined,
        Some("tentative") => ResponseStatus::Tentative,
        Some(_) => ResponseStatus::Other,
    }
}
