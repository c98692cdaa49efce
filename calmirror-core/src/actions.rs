//! User-facing operations: connecting, answering invitations, reminders.
//!
//! Each operation reports its result to the user as a direct message in addition
//! to returning it.

use std::sync::Arc;

use crate::constants::{MSG_DELETE_NOT_ORGANIZER, MSG_DISCONNECTED, MSG_WELCOME};
use crate::error::{CalMirrorError, CalMirrorResult};
use crate::event::ResponseStatus;
use crate::messenger::post_or_log;
use crate::reminder::due_reminders;
use crate::state::EventMirror;
use crate::sync::{SyncCoordinator, SyncReport};
use crate::watch::WatchChannelManager;

pub struct CalendarActions {
    watch: Arc<WatchChannelManager>,
}

impl CalendarActions {
    pub fn new(watch: Arc<WatchChannelManager>) -> Self {
        CalendarActions { watch }
    }

    fn coordinator(&self) -> &SyncCoordinator {
        self.watch.coordinator()
    }

    /// Rebuild the mirror from scratch and subscribe to changes.
    pub async fn connect(&self, user_id: &str) -> CalMirrorResult<SyncReport> {
        let coordinator = self.coordinator();
        let _guard = coordinator.locks().lock(user_id).await;

        coordinator.reset(user_id).await?;
        let report = coordinator.sync_locked(user_id).await?;

        if let Err(e) = self.watch.stop_if_any(user_id).await {
            tracing::warn!(user = user_id, error = %e, "could not stop previous watch channel");
        }
        self.watch.start(user_id).await?;

        post_or_log(coordinator.messenger(), user_id, MSG_WELCOME).await;
        tracing::info!(user = user_id, events = report.events, "user connected");
        Ok(report)
    }

    /// Unsubscribe, drop everything stored for the user and unregister them.
    pub async fn disconnect(&self, user_id: &str) -> CalMirrorResult<()> {
        let coordinator = self.coordinator();
        let _guard = coordinator.locks().lock(user_id).await;

        if let Err(e) = self.watch.stop_if_any(user_id).await {
            tracing::warn!(user = user_id, error = %e, "could not stop watch channel");
        }

        coordinator.reset(user_id).await?;
        coordinator.tokens().clear_watch_channel(user_id).await?;
        coordinator.forget(user_id).await?;

        post_or_log(coordinator.messenger(), user_id, MSG_DISCONNECTED).await;
        tracing::info!(user = user_id, "user disconnected");
        Ok(())
    }

    /// Record the user's answer to an invitation.
    pub async fn respond(
        &self,
        user_id: &str,
        event_id: &str,
        response: ResponseStatus,
    ) -> CalMirrorResult<()> {
        let coordinator = self.coordinator();
        let account = coordinator.account(user_id).await?;
        let remote = coordinator.remote(&account).await?;

        let event = match remote.get_event(event_id).await {
            Ok(event) => event,
            Err(e) => {
                let text = format!("Unable to respond to event. Error: {e}");
                post_or_log(coordinator.messenger(), user_id, &text).await;
                return Err(e);
            }
        };

        if event.viewer().is_none() {
            return Err(CalMirrorError::Remote(format!(
                "{user_id} is not invited to event {event_id}"
            )));
        }

        match remote.respond_to_event(event_id, response).await {
            Ok(updated) => {
                let text = format!("Success! Event _{updated}_ response has been updated.");
                post_or_log(coordinator.messenger(), user_id, &text).await;
                Ok(())
            }
            Err(e) => {
                let text = format!("Error! Failed to update the response of _{event}_ event.");
                post_or_log(coordinator.messenger(), user_id, &text).await;
                Err(e)
            }
        }
    }

    /// Delete an event the user organizes. Returns `false` when the user is not
    /// the organizer and nothing was deleted.
    pub async fn delete_event(&self, user_id: &str, event_id: &str) -> CalMirrorResult<bool> {
        let coordinator = self.coordinator();
        let messenger = coordinator.messenger();
        let account = coordinator.account(user_id).await?;
        let remote = coordinator.remote(&account).await?;

        let event = match remote.get_event(event_id).await {
            Ok(event) => event,
            Err(e) => {
                post_or_log(messenger, user_id, &format!("Unable to delete event. Error: {e}")).await;
                return Err(e);
            }
        };

        if !event.organizer_self() {
            post_or_log(messenger, user_id, MSG_DELETE_NOT_ORGANIZER).await;
            return Ok(false);
        }

        if let Err(e) = remote.delete_event(event_id).await {
            post_or_log(messenger, user_id, &format!("Unable to delete event. Error: {e}")).await;
            return Err(e);
        }

        let text = format!("Success! Event _{event}_ has been deleted.");
        post_or_log(messenger, user_id, &text).await;
        Ok(true)
    }

    /// Send "starting soon" messages for the user's due events. Returns how many
    /// were sent.
    pub async fn remind(&self, user_id: &str) -> CalMirrorResult<usize> {
        let coordinator = self.coordinator();
        let account = coordinator.account(user_id).await?;
        if !account.allow_notify {
            return Ok(0);
        }

        let Some(mirror) = EventMirror::load(coordinator.store(), user_id).await? else {
            return Ok(0);
        };

        let now = coordinator.now();
        let minutes = account.remind_before_minutes;
        let due = due_reminders(&mirror, now, minutes);
        if due.is_empty() {
            return Ok(0);
        }

        let remote = coordinator.remote(&account).await?;
        let tz = coordinator.time_zone(remote.as_ref()).await;
        for event in &due {
            let text = coordinator.composer().compose_reminder(event, minutes, tz, now);
            post_or_log(coordinator.messenger(), user_id, &text).await;
        }

        tracing::debug!(user = user_id, count = due.len(), "reminders sent");
        Ok(due.len())
    }
}
