//! In-memory collaborators for driving the engine end to end.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use calmirror_core::clock::{FixedClock, IdSource};
use calmirror_core::messenger::Messenger;
use calmirror_core::remote::{
    ChannelRequest, EventPage, ListQuery, RemoteCalendar, RemoteConnector, WatchChannel,
};
use calmirror_core::state::{EventMirror, TokenStore};
use calmirror_core::store::{KeyValueStore, MemoryStore};
use calmirror_core::user::{UserAccount, UserDirectory};
use calmirror_core::{
    Attendee, CalMirrorError, CalMirrorResult, CalendarActions, EventStatus, EventTime,
    MirroredEvent, NotificationComposer, Organizer, ResponseStatus, SyncCoordinator,
    WatchChannelManager,
};

pub const SITE: &str = "https://chat.example.com/plugins/calendar";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap()
}

pub fn event(id: &str, start: &str) -> MirroredEvent {
    let start = DateTime::parse_from_rfc3339(start).unwrap();
    MirroredEvent {
        id: id.to_string(),
        title: format!("Event {id}"),
        start: Some(EventTime::DateTime(start)),
        end: Some(EventTime::DateTime(start + Duration::hours(1))),
        location: None,
        status: EventStatus::Confirmed,
        organizer: Some(Organizer {
            email: "boss@example.com".into(),
            is_self: false,
        }),
        creator_self: false,
        attendees: vec![
            Attendee {
                email: "boss@example.com".into(),
                is_self: false,
                response_status: ResponseStatus::Accepted,
            },
            Attendee {
                email: "me@example.com".into(),
                is_self: true,
                response_status: ResponseStatus::NeedsAction,
            },
        ],
        link: format!("https://calendar.example.com/{id}"),
        conference_link: None,
    }
}

pub fn tombstone(id: &str) -> MirroredEvent {
    MirroredEvent {
        id: id.to_string(),
        title: String::new(),
        start: None,
        end: None,
        location: None,
        status: EventStatus::Cancelled,
        organizer: None,
        creator_self: false,
        attendees: vec![],
        link: String::new(),
        conference_link: None,
    }
}

/// Remote calendar whose change feed is fed by the test.
#[derive(Default)]
pub struct FakeRemote {
    pub state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    /// What a full listing returns.
    pub events: Vec<MirroredEvent>,
    /// What the next incremental listing returns.
    pub pending: Vec<MirroredEvent>,
    pub generation: u64,
    pub page_size: usize,
    /// Page index that fails with a transient error.
    pub fail_page: Option<usize>,
    pub reject_tokens: bool,
    /// Stopping any channel answers "not found".
    pub channels_gone: bool,
    pub time_zone: Option<String>,
    pub queries: Vec<ListQuery>,
    pub watch_requests: Vec<ChannelRequest>,
    pub stopped: Vec<(String, String)>,
    /// Users whose credentials were dropped.
    pub forgotten: Vec<String>,
    pub updated: Vec<MirroredEvent>,
    pub deleted: Vec<String>,
}

impl FakeRemote {
    pub fn new(events: Vec<MirroredEvent>) -> Arc<Self> {
        let remote = FakeRemote::default();
        {
            let mut state = remote.state.lock().unwrap();
            state.events = events;
            state.page_size = 50;
            state.time_zone = Some("UTC".into());
        }
        Arc::new(remote)
    }

    /// Apply a change remotely and queue it for the next incremental listing.
    pub fn push_change(&self, change: MirroredEvent) {
        let mut state = self.state.lock().unwrap();
        state.events.retain(|e| e.id != change.id);
        if change.status != EventStatus::Cancelled {
            state.events.push(change.clone());
        }
        state.pending.push(change);
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn token(generation: u64) -> String {
        format!("tok-{generation}")
    }
}

#[async_trait]
impl RemoteCalendar for FakeRemote {
    async fn list_events(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> CalMirrorResult<EventPage> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());

        let page: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        if state.fail_page == Some(page) {
            return Err(CalMirrorError::Transient("connection reset".into()));
        }

        let source = match query {
            ListQuery::Window { .. } => state.events.clone(),
            ListQuery::Changes { sync_token } => {
                if state.reject_tokens || !sync_token.starts_with("tok-") {
                    return Err(CalMirrorError::TokenInvalid);
                }
                state.pending.clone()
            }
        };

        let size = state.page_size.max(1);
        let pages = source.len().div_ceil(size).max(1);
        let events = source.into_iter().skip(page * size).take(size).collect();

        if page + 1 < pages {
            return Ok(EventPage {
                events,
                next_page_token: Some((page + 1).to_string()),
                next_sync_token: None,
            });
        }

        if query.is_incremental() && !state.pending.is_empty() {
            state.pending.clear();
            state.generation += 1;
        }
        Ok(EventPage {
            events,
            next_page_token: None,
            next_sync_token: Some(Self::token(state.generation)),
        })
    }

    async fn time_zone(&self) -> CalMirrorResult<String> {
        self.with(|s| s.time_zone.clone())
            .ok_or_else(|| CalMirrorError::Transient("settings unavailable".into()))
    }

    async fn get_event(&self, event_id: &str) -> CalMirrorResult<MirroredEvent> {
        self.with(|s| s.events.iter().find(|e| e.id == event_id).cloned())
            .ok_or_else(|| CalMirrorError::RemoteNotFound(event_id.to_string()))
    }

    async fn respond_to_event(
        &self,
        event_id: &str,
        response: ResponseStatus,
    ) -> CalMirrorResult<MirroredEvent> {
        self.with(|s| {
            let event = s
                .events
                .iter_mut()
                .find(|e| e.id == event_id)
                .ok_or_else(|| CalMirrorError::RemoteNotFound(event_id.to_string()))?;
            if let Some(viewer) = event.viewer_mut() {
                viewer.response_status = response;
            }
            let event = event.clone();
            s.updated.push(event.clone());
            Ok(event)
        })
    }

    async fn delete_event(&self, event_id: &str) -> CalMirrorResult<()> {
        self.with(|s| {
            s.events.retain(|e| e.id != event_id);
            s.deleted.push(event_id.to_string());
        });
        Ok(())
    }

    async fn insert_event(&self, event: &MirroredEvent) -> CalMirrorResult<MirroredEvent> {
        self.with(|s| s.events.push(event.clone()));
        Ok(event.clone())
    }

    async fn watch(&self, request: &ChannelRequest) -> CalMirrorResult<WatchChannel> {
        self.with(|s| s.watch_requests.push(request.clone()));
        Ok(WatchChannel {
            channel_id: request.id.clone(),
            resource_id: format!("res-{}", request.id),
            token: Some(request.token.clone()),
            expiration: Some("1742500000000".into()),
        })
    }

    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> CalMirrorResult<()> {
        self.with(|s| {
            if s.channels_gone {
                return Err(CalMirrorError::RemoteNotFound(channel_id.to_string()));
            }
            s.stopped.push((channel_id.to_string(), resource_id.to_string()));
            Ok(())
        })
    }
}

pub struct FakeConnector {
    pub remote: Arc<FakeRemote>,
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(&self, account: &UserAccount) -> CalMirrorResult<Arc<dyn RemoteCalendar>> {
        if self.remote.with(|s| s.forgotten.contains(&account.user_id)) {
            return Err(CalMirrorError::UserNotConnected(account.user_id.clone()));
        }
        Ok(self.remote.clone())
    }

    async fn forget(&self, user_id: &str) -> CalMirrorResult<()> {
        self.remote.with(|s| s.forgotten.push(user_id.to_string()));
        Ok(())
    }
}

pub struct StaticDirectory {
    pub users: Mutex<Vec<UserAccount>>,
}

impl StaticDirectory {
    pub fn new(users: Vec<UserAccount>) -> Self {
        StaticDirectory {
            users: Mutex::new(users),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn get_user(&self, user_id: &str) -> CalMirrorResult<Option<UserAccount>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn remove_user(&self, user_id: &str) -> CalMirrorResult<()> {
        self.users.lock().unwrap().retain(|u| u.user_id != user_id);
        Ok(())
    }

    async fn list_users(&self, page: usize, limit: usize) -> CalMirrorResult<Vec<UserAccount>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn post_direct_message(&self, user_id: &str, text: &str) -> CalMirrorResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// `id-1`, `id-2`, ...
#[derive(Default)]
pub struct SequentialIds(AtomicUsize);

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub store: Arc<dyn KeyValueStore>,
    pub messenger: Arc<RecordingMessenger>,
    pub coordinator: Arc<SyncCoordinator>,
    pub watch: Arc<WatchChannelManager>,
    pub actions: CalendarActions,
}

impl Harness {
    pub fn new(events: Vec<MirroredEvent>) -> Self {
        Self::with_users(events, vec![UserAccount::new("u1")])
    }

    pub fn with_users(events: Vec<MirroredEvent>, users: Vec<UserAccount>) -> Self {
        let remote = FakeRemote::new(events);
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::default());

        let coordinator = Arc::new(
            SyncCoordinator::new(
                Arc::new(FakeConnector {
                    remote: remote.clone(),
                }),
                Arc::new(StaticDirectory::new(users)),
                store.clone(),
                Arc::new(NotificationComposer::new(SITE).unwrap()),
                messenger.clone(),
            )
            .with_clock(Arc::new(FixedClock(now()))),
        );
        let watch = Arc::new(
            WatchChannelManager::new(coordinator.clone())
                .with_id_source(Arc::new(SequentialIds::default())),
        );
        let actions = CalendarActions::new(watch.clone());

        Harness {
            remote,
            store,
            messenger,
            coordinator,
            watch,
            actions,
        }
    }

    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(self.store.clone())
    }

    pub async fn mirror(&self, user_id: &str) -> Option<EventMirror> {
        EventMirror::load(&self.store, user_id).await.unwrap()
    }

    pub async fn mirror_ids(&self, user_id: &str) -> Vec<String> {
        self.mirror(user_id)
            .await
            .map(|m| m.events().iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn cursor(&self, user_id: &str) -> Option<String> {
        self.tokens().sync_cursor(user_id).await.unwrap()
    }
}
