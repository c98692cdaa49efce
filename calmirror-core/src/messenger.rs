use async_trait::async_trait;

use crate::error::CalMirrorResult;

/// Delivers direct messages to a user in the host chat system.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn post_direct_message(&self, user_id: &str, text: &str) -> CalMirrorResult<()>;
}

/// Post and log on failure. Messages are never retried.
pub async fn post_or_log(messenger: &dyn Messenger, user_id: &str, text: &str) {
    if let Err(e) = messenger.post_direct_message(user_id, text).await {
        tracing::error!(user = user_id, error = %e, "failed to post direct message");
    }
}
