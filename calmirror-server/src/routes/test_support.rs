//! In-memory collaborators for exercising the routes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};

use calmirror_core::clock::FixedClock;
use calmirror_core::messenger::Messenger;
use calmirror_core::remote::{
    ChannelRequest, EventPage, ListQuery, RemoteCalendar, RemoteConnector, WatchChannel,
};
use calmirror_core::store::MemoryStore;
use calmirror_core::user::UserAccount;
use calmirror_core::{
    Attendee, CalMirrorError, CalMirrorResult, EventStatus, EventTime, MirroredEvent,
    NotificationComposer, Organizer, ResponseStatus, SyncCoordinator,
};

use crate::directory::FileUserDirectory;
use crate::state::AppState;

pub const SITE: &str = "https://chat.example.com/plugins/calendar";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 20, 8, 0, 0).unwrap()
}

pub fn event(id: &str, organizer_self: bool) -> MirroredEvent {
    let start = (now() + Duration::hours(2)).fixed_offset();
    MirroredEvent {
        id: id.to_string(),
        title: format!("Event {id}"),
        start: Some(EventTime::DateTime(start)),
        end: Some(EventTime::DateTime(start + Duration::hours(1))),
        location: None,
        status: EventStatus::Confirmed,
        organizer: Some(Organizer {
            email: "boss@example.com".into(),
            is_self: organizer_self,
        }),
        creator_self: organizer_self,
        attendees: vec![Attendee {
            email: "me@example.com".into(),
            is_self: true,
            response_status: ResponseStatus::NeedsAction,
        }],
        link: String::new(),
        conference_link: None,
    }
}

#[derive(Default)]
pub struct StubState {
    pub events: Vec<MirroredEvent>,
    pub watches: Vec<ChannelRequest>,
    pub stopped: Vec<String>,
    pub updated: Vec<MirroredEvent>,
    pub deleted: Vec<String>,
}

#[derive(Default)]
pub struct StubRemote {
    pub state: Mutex<StubState>,
}

impl StubRemote {
    fn find(&self, event_id: &str) -> CalMirrorResult<MirroredEvent> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or_else(|| CalMirrorError::RemoteNotFound(event_id.to_string()))
    }
}

#[async_trait]
impl RemoteCalendar for StubRemote {
    async fn list_events(
        &self,
        _query: &ListQuery,
        _page_token: Option<&str>,
    ) -> CalMirrorResult<EventPage> {
        Ok(EventPage {
            events: self.state.lock().unwrap().events.clone(),
            next_page_token: None,
            next_sync_token: Some("tok-1".into()),
        })
    }

    async fn time_zone(&self) -> CalMirrorResult<String> {
        Ok("UTC".into())
    }

    async fn get_event(&self, event_id: &str) -> CalMirrorResult<MirroredEvent> {
        self.find(event_id)
    }

    async fn respond_to_event(
        &self,
        event_id: &str,
        response: ResponseStatus,
    ) -> CalMirrorResult<MirroredEvent> {
        let mut event = self.find(event_id)?;
        if let Some(viewer) = event.viewer_mut() {
            viewer.response_status = response;
        }
        self.state.lock().unwrap().updated.push(event.clone());
        Ok(event)
    }

    async fn delete_event(&self, event_id: &str) -> CalMirrorResult<()> {
        self.find(event_id)?;
        self.state.lock().unwrap().deleted.push(event_id.to_string());
        Ok(())
    }

    async fn insert_event(&self, event: &MirroredEvent) -> CalMirrorResult<MirroredEvent> {
        self.state.lock().unwrap().events.push(event.clone());
        Ok(event.clone())
    }

    async fn watch(&self, request: &ChannelRequest) -> CalMirrorResult<WatchChannel> {
        self.state.lock().unwrap().watches.push(request.clone());
        Ok(WatchChannel {
            channel_id: request.id.clone(),
            resource_id: "res-1".into(),
            token: Some(request.token.clone()),
            expiration: None,
        })
    }

    async fn stop_channel(&self, channel_id: &str, _resource_id: &str) -> CalMirrorResult<()> {
        self.state.lock().unwrap().stopped.push(channel_id.to_string());
        Ok(())
    }
}

/// Connects every registered user to the same stub, except those listed.
pub struct StubConnector {
    pub remote: Arc<StubRemote>,
    pub disconnected: Vec<String>,
}

#[async_trait]
impl RemoteConnector for StubConnector {
    async fn connect(&self, account: &UserAccount) -> CalMirrorResult<Arc<dyn RemoteCalendar>> {
        if self.disconnected.contains(&account.user_id) {
            return Err(CalMirrorError::UserNotConnected(account.user_id.clone()));
        }
        Ok(self.remote.clone())
    }

    async fn forget(&self, _user_id: &str) -> CalMirrorResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMessenger {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
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

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub remote: Arc<StubRemote>,
    pub messenger: Arc<RecordingMessenger>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    /// `registered` users get an account file; `disconnected` ones have no session.
    pub async fn new(registered: &[&str], disconnected: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(FileUserDirectory::new(dir.path().join("users")));
        for id in registered {
            directory.save(&UserAccount::new(*id)).await.unwrap();
        }

        let remote = Arc::new(StubRemote::default());
        let connector = Arc::new(StubConnector {
            remote: remote.clone(),
            disconnected: disconnected.iter().map(|s| s.to_string()).collect(),
        });
        let messenger = Arc::new(RecordingMessenger::default());

        let coordinator = SyncCoordinator::new(
            connector,
            directory.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(NotificationComposer::new(SITE).unwrap()),
            messenger.clone(),
        )
        .with_clock(Arc::new(FixedClock(now())));

        let state = AppState::new(Arc::new(coordinator), directory);
        TestApp {
            router: super::router(state.clone()),
            state,
            remote,
            messenger,
            _dir: dir,
        }
    }
}
