//! Push subscriptions and inbound webhook handling.

use std::sync::Arc;

use crate::clock::{IdSource, UuidSource};
use crate::constants::RESOURCE_STATE_SYNC;
use crate::error::{CalMirrorError, CalMirrorResult};
use crate::remote::{ChannelRequest, RemoteCalendar, WatchChannel};
use crate::sync::{SyncCoordinator, SyncReport};

/// The parts of a push callback the engine looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub user_id: String,
    pub channel_id: String,
    pub resource_id: String,
    pub resource_state: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The remote confirmed a new channel. Nothing was synced.
    Handshake,
    /// The callback was not from the user's live channel. Nothing was synced.
    Ignored,
    Synced(SyncReport),
}

/// How a callback relates to the stored descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    /// No descriptor is stored for the user.
    Unsubscribed,
    /// A channel other than the stored one.
    Stale,
    /// The stored channel id with a token that doesn't match.
    Forged,
    Live,
}

pub struct WatchChannelManager {
    coordinator: Arc<SyncCoordinator>,
    ids: Arc<dyn IdSource>,
}

impl WatchChannelManager {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        WatchChannelManager {
            coordinator,
            ids: Arc::new(UuidSource),
        }
    }

    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Open a new channel and store it, replacing whatever was stored.
    /// The previous channel is left running.
    pub async fn start(&self, user_id: &str) -> CalMirrorResult<WatchChannel> {
        let account = self.coordinator.account(user_id).await?;
        let remote = self.coordinator.remote(&account).await?;

        let request = ChannelRequest {
            id: self.ids.next_id(),
            address: self.coordinator.composer().watch_url(user_id).to_string(),
            token: self.ids.next_id(),
        };

        let mut channel = remote.watch(&request).await?;
        // Some responses omit the token; the one we sent is what callbacks carry
        if channel.token.is_none() {
            channel.token = Some(request.token);
        }

        self.coordinator
            .tokens()
            .set_watch_channel(user_id, &channel)
            .await?;

        tracing::info!(user = user_id, channel = %channel.channel_id, "watch channel started");
        Ok(channel)
    }

    /// Stop the stored channel and forget it.
    pub async fn stop(&self, user_id: &str) -> CalMirrorResult<()> {
        let channel = self
            .coordinator
            .tokens()
            .watch_channel(user_id)
            .await?
            .ok_or_else(|| CalMirrorError::ChannelNotFound(user_id.to_string()))?;

        let account = self.coordinator.account(user_id).await?;
        let remote = self.coordinator.remote(&account).await?;
        stop_remote(remote.as_ref(), &channel.channel_id, &channel.resource_id).await?;

        self.coordinator.tokens().clear_watch_channel(user_id).await?;
        tracing::info!(user = user_id, channel = %channel.channel_id, "watch channel stopped");
        Ok(())
    }

    /// Like [`Self::stop`], but a user without a channel is fine.
    pub async fn stop_if_any(&self, user_id: &str) -> CalMirrorResult<()> {
        match self.stop(user_id).await {
            Err(CalMirrorError::ChannelNotFound(_)) => Ok(()),
            result => result,
        }
    }

    pub async fn handle_notification(
        &self,
        notification: &WebhookNotification,
    ) -> CalMirrorResult<WebhookOutcome> {
        let user_id = notification.user_id.as_str();

        if notification.resource_state == RESOURCE_STATE_SYNC {
            tracing::info!(user = user_id, "watch channel handshake");
            return Ok(WebhookOutcome::Handshake);
        }

        let stored = self.coordinator.tokens().watch_channel(user_id).await?;
        match classify(stored.as_ref(), notification) {
            Caller::Unsubscribed => {
                tracing::info!(
                    user = user_id,
                    channel = %notification.channel_id,
                    "callback for a user without a channel, stopping it"
                );
                self.stop_stale(notification).await;
                return Ok(WebhookOutcome::Ignored);
            }
            Caller::Forged => {
                tracing::warn!(
                    user = user_id,
                    channel = %notification.channel_id,
                    "callback token does not match the stored channel"
                );
                return Ok(WebhookOutcome::Ignored);
            }
            Caller::Stale => {
                tracing::warn!(
                    user = user_id,
                    channel = %notification.channel_id,
                    "callback from a replaced channel, stopping it"
                );
                self.stop_stale(notification).await;
            }
            Caller::Live => {}
        }

        let report = self.coordinator.sync(user_id).await?;
        Ok(WebhookOutcome::Synced(report))
    }

    async fn stop_stale(&self, notification: &WebhookNotification) {
        let result = async {
            let account = self.coordinator.account(&notification.user_id).await?;
            let remote = self.coordinator.remote(&account).await?;
            stop_remote(
                remote.as_ref(),
                &notification.channel_id,
                &notification.resource_id,
            )
            .await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(user = %notification.user_id, error = %e, "failed to stop stale channel");
        }
    }
}

fn classify(stored: Option<&WatchChannel>, notification: &WebhookNotification) -> Caller {
    let Some(stored) = stored else {
        return Caller::Unsubscribed;
    };
    if stored.channel_id != notification.channel_id {
        return Caller::Stale;
    }
    match &stored.token {
        Some(token) if notification.token.as_ref() != Some(token) => Caller::Forged,
        _ => Caller::Live,
    }
}

/// Channels the remote has already dropped count as stopped.
async fn stop_remote(
    remote: &dyn RemoteCalendar,
    channel_id: &str,
    resource_id: &str,
) -> CalMirrorResult<()> {
    match remote.stop_channel(channel_id, resource_id).await {
        Err(CalMirrorError::RemoteNotFound(what)) => {
            tracing::debug!(channel = channel_id, %what, "channel already gone");
            Ok(())
        }
        result => result,
    }
}
