use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::ChangeKind;
use crate::event::{EventTime, MirroredEvent};

/// Event properties whose change is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Title,
    /// Start and end together.
    When,
    Location,
    /// Number of attendees.
    Guests,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: Field,
    pub old: String,
    pub new: String,
}

/// How one changed remote event affected the mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChange {
    pub kind: ChangeKind,
    /// The changed event was created by the syncing user.
    pub is_self_created: bool,
    /// The event as it is now (for removals: the last mirrored version, cancelled).
    pub event: MirroredEvent,
    /// The mirror entry it replaced, if any.
    pub previous: Option<MirroredEvent>,
    pub field_diffs: Vec<FieldDiff>,
}

impl fmt::Display for EventChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.event)
    }
}

impl EventChange {
    pub fn added(event: MirroredEvent) -> Self {
        EventChange {
            kind: ChangeKind::Added,
            is_self_created: event.creator_self,
            event,
            previous: None,
            field_diffs: Vec::new(),
        }
    }

    /// Diff two versions of the same event.
    pub fn between(old: MirroredEvent, new: MirroredEvent) -> Self {
        let field_diffs = field_diffs(&old, &new);
        let kind = if new.is_cancelled() {
            ChangeKind::Removed
        } else if field_diffs.is_empty() {
            ChangeKind::NoChange
        } else {
            ChangeKind::Updated
        };

        EventChange {
            kind,
            is_self_created: new.creator_self,
            event: new,
            previous: Some(old),
            field_diffs,
        }
    }

    /// Whether this change is worth telling the user about.
    pub fn has_semantic_change(&self) -> bool {
        match self.kind {
            ChangeKind::Added => true,
            ChangeKind::NoChange => false,
            ChangeKind::Updated | ChangeKind::Removed => !self.field_diffs.is_empty(),
        }
    }

    pub fn diff(&self, field: Field) -> Option<&FieldDiff> {
        self.field_diffs.iter().find(|d| d.field == field)
    }

    pub fn changed(&self, field: Field) -> bool {
        self.diff(field).is_some()
    }
}

fn same_time(a: &Option<EventTime>, b: &Option<EventTime>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_instant(b),
        (None, None) => true,
        _ => false,
    }
}

fn window_text(event: &MirroredEvent) -> String {
    let show = |t: &Option<EventTime>| t.as_ref().map(ToString::to_string).unwrap_or_default();
    format!("{} - {}", show(&event.start), show(&event.end))
}

fn field_diffs(old: &MirroredEvent, new: &MirroredEvent) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if old.title != new.title {
        diffs.push(FieldDiff {
            field: Field::Title,
            old: old.title.clone(),
            new: new.title.clone(),
        });
    }

    if !same_time(&old.start, &new.start) || !same_time(&old.end, &new.end) {
        diffs.push(FieldDiff {
            field: Field::When,
            old: window_text(old),
            new: window_text(new),
        });
    }

    if old.location_text() != new.location_text() {
        diffs.push(FieldDiff {
            field: Field::Location,
            old: old.location_text().to_string(),
            new: new.location_text().to_string(),
        });
    }

    if old.attendees.len() != new.attendees.len() {
        diffs.push(FieldDiff {
            field: Field::Guests,
            old: old.attendees.len().to_string(),
            new: new.attendees.len().to_string(),
        });
    }

    if old.status != new.status {
        diffs.push(FieldDiff {
            field: Field::Status,
            old: old.status.as_str().to_string(),
            new: new.status.as_str().to_string(),
        });
    }

    diffs
}
