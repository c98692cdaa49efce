//! The locally persisted copy of a user's events.

use std::sync::Arc;

use crate::constants::EVENTS_KEY;
use crate::error::{CalMirrorError, CalMirrorResult};
use crate::event::MirroredEvent;
use crate::store::KeyValueStore;

/// Events ordered ascending by start, unique by id, never cancelled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMirror {
    events: Vec<MirroredEvent>,
}

impl EventMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror from a full listing: cancelled entries dropped, later
    /// duplicates of an id replace earlier ones, then sorted by start.
    pub fn from_listing(listing: Vec<MirroredEvent>) -> Self {
        let mut events: Vec<MirroredEvent> = Vec::with_capacity(listing.len());
        for event in listing.into_iter().filter(|e| !e.is_cancelled()) {
            match events.iter_mut().find(|e| e.id == event.id) {
                Some(existing) => *existing = event,
                None => events.push(event),
            }
        }
        // Stable, so equal starts keep listing order
        events.sort_by_key(|e| e.start_key());
        EventMirror { events }
    }

    pub fn events(&self) -> &[MirroredEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }

    /// Insert after every entry whose start is not later than the new one.
    pub fn insert_sorted(&mut self, event: MirroredEvent) {
        let key = event.start_key();
        let index = self.events.partition_point(|e| e.start_key() <= key);
        self.events.insert(index, event);
    }

    pub fn replace_at(&mut self, index: usize, event: MirroredEvent) -> MirroredEvent {
        std::mem::replace(&mut self.events[index], event)
    }

    pub fn remove_at(&mut self, index: usize) -> MirroredEvent {
        self.events.remove(index)
    }

    /// Load the stored mirror. `Ok(None)` when nothing is stored.
    pub async fn load(store: &Arc<dyn KeyValueStore>, user_id: &str) -> CalMirrorResult<Option<Self>> {
        let Some(raw) = store.get(user_id, EVENTS_KEY).await? else {
            return Ok(None);
        };

        let events: Vec<MirroredEvent> =
            serde_json::from_str(&raw).map_err(|e| CalMirrorError::MalformedMirror {
                user: user_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(EventMirror { events }))
    }

    pub async fn save(&self, store: &Arc<dyn KeyValueStore>, user_id: &str) -> CalMirrorResult<()> {
        let raw = serde_json::to_string(&self.events)?;
        store.set(user_id, EVENTS_KEY, &raw).await
    }

    pub async fn clear(store: &Arc<dyn KeyValueStore>, user_id: &str) -> CalMirrorResult<()> {
        store.delete(user_id, EVENTS_KEY).await
    }
}
