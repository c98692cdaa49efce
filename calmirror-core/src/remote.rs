//! Contract with the remote calendar service.
//!
//! Providers implement [`RemoteCalendar`] for one authenticated user and a
//! [`RemoteConnector`] that builds it from a [`UserAccount`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalMirrorResult;
use crate::event::{MirroredEvent, ResponseStatus};
use crate::user::UserAccount;

/// What a listing asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ListQuery {
    /// Recurring events expanded into single instances within the window.
    Window {
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    },
    /// Everything changed since the cursor, including deleted markers.
    Changes { sync_token: String },
}

impl ListQuery {
    pub fn is_incremental(&self) -> bool {
        matches!(self, ListQuery::Changes { .. })
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<MirroredEvent>,
    pub next_page_token: Option<String>,
    /// Only present on the last page.
    pub next_sync_token: Option<String>,
}

/// Subscription request for push notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub id: String,
    pub address: String,
    pub token: String,
}

/// An active push subscription.
///
/// Field names follow the remote's channel resource so the stored descriptor is
/// the wire payload itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchChannel {
    #[serde(rename = "id")]
    pub channel_id: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

#[async_trait]
pub trait RemoteCalendar: Send + Sync {
    /// Fetch one page. A rejected `sync_token` must surface as
    /// [`crate::CalMirrorError::TokenInvalid`].
    async fn list_events(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> CalMirrorResult<EventPage>;

    /// IANA name of the primary calendar's time zone.
    async fn time_zone(&self) -> CalMirrorResult<String>;

    async fn get_event(&self, event_id: &str) -> CalMirrorResult<MirroredEvent>;
    /// Set the authenticated user's own attendance. Other attendees and the rest
    /// of the event are left as the remote has them.
    async fn respond_to_event(
        &self,
        event_id: &str,
        response: ResponseStatus,
    ) -> CalMirrorResult<MirroredEvent>;
    async fn delete_event(&self, event_id: &str) -> CalMirrorResult<()>;
    async fn insert_event(&self, event: &MirroredEvent) -> CalMirrorResult<MirroredEvent>;

    async fn watch(&self, request: &ChannelRequest) -> CalMirrorResult<WatchChannel>;
    /// A channel that is already gone surfaces as
    /// [`crate::CalMirrorError::RemoteNotFound`].
    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> CalMirrorResult<()>;
}

/// Builds an authenticated client for a user.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Fails with [`crate::CalMirrorError::UserNotConnected`] when the user has no
    /// credentials on file.
    async fn connect(&self, account: &UserAccount) -> CalMirrorResult<Arc<dyn RemoteCalendar>>;

    /// Drop the user's stored credentials. Afterwards `connect` fails with
    /// `UserNotConnected`.
    async fn forget(&self, user_id: &str) -> CalMirrorResult<()>;
}
