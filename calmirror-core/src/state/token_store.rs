//! Sync cursor and watch channel persistence.

use std::sync::Arc;

use crate::constants::{SYNC_TOKEN_KEY, WATCH_CHANNEL_KEY};
use crate::error::CalMirrorResult;
use crate::remote::WatchChannel;
use crate::store::KeyValueStore;

/// Typed access to the two per-user values that drive sync and webhooks.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        TokenStore { store }
    }

    /// The stored cursor, or `None` when the next run must be a full sync.
    pub async fn sync_cursor(&self, user_id: &str) -> CalMirrorResult<Option<String>> {
        let cursor = self.store.get(user_id, SYNC_TOKEN_KEY).await?;
        Ok(cursor.filter(|c| !c.is_empty()))
    }

    pub async fn set_sync_cursor(&self, user_id: &str, cursor: &str) -> CalMirrorResult<()> {
        self.store.set(user_id, SYNC_TOKEN_KEY, cursor).await
    }

    pub async fn clear_sync_cursor(&self, user_id: &str) -> CalMirrorResult<()> {
        self.store.delete(user_id, SYNC_TOKEN_KEY).await
    }

    pub async fn watch_channel(&self, user_id: &str) -> CalMirrorResult<Option<WatchChannel>> {
        let Some(raw) = self.store.get(user_id, WATCH_CHANNEL_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub async fn set_watch_channel(
        &self,
        user_id: &str,
        channel: &WatchChannel,
    ) -> CalMirrorResult<()> {
        let raw = serde_json::to_string(channel)?;
        self.store.set(user_id, WATCH_CHANNEL_KEY, &raw).await
    }

    pub async fn clear_watch_channel(&self, user_id: &str) -> CalMirrorResult<()> {
        self.store.delete(user_id, WATCH_CHANNEL_KEY).await
    }
}
