//! Applies a batch of changed remote events to the mirror.

use crate::diff::{ChangeSummary, EventChange};
use crate::event::{EventStatus, MirroredEvent};
use crate::state::EventMirror;

/// Result of merging one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub mirror: EventMirror,
    pub summary: ChangeSummary,
}

/// Pure merge of changed events into a mirror. No clock, no randomness: the same
/// inputs always give the same outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventMerger;

impl EventMerger {
    pub fn merge(mut mirror: EventMirror, changed: &[MirroredEvent]) -> MergeOutcome {
        let mut summary = ChangeSummary::default();

        for event in changed {
            if event.creator_self {
                summary.self_authored = true;
            }

            match mirror.position(&event.id) {
                Some(index) if event.is_cancelled() => {
                    let old = mirror.remove_at(index);
                    // Tombstones carry little more than the id, so describe the
                    // removal with the last version we mirrored
                    let mut gone = old.clone();
                    gone.status = EventStatus::Cancelled;

                    let mut change = EventChange::between(old, gone);
                    change.is_self_created = event.creator_self;
                    summary.changes.push(change);
                }
                Some(index) => {
                    let old = if mirror.events()[index].start_key() == event.start_key() {
                        mirror.replace_at(index, event.clone())
                    } else {
                        // Moved in time: re-insert to keep the mirror ordered
                        let old = mirror.remove_at(index);
                        mirror.insert_sorted(event.clone());
                        old
                    };
                    summary.changes.push(EventChange::between(old, event.clone()));
                }
                None if !event.is_cancelled() => {
                    mirror.insert_sorted(event.clone());
                    summary.changes.push(EventChange::added(event.clone()));
                }
                None => {
                    tracing::debug!(event = %event.id, "ignoring cancellation of unmirrored event");
                }
            }
        }

        MergeOutcome { mirror, summary }
    }
}
