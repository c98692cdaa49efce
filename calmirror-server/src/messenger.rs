use async_trait::async_trait;
use serde::Serialize;

use calmirror_core::messenger::Messenger;
use calmirror_core::{CalMirrorError, CalMirrorResult};

#[derive(Serialize)]
struct DirectMessage<'a> {
    user_id: &'a str,
    text: &'a str,
}

/// Posts direct messages to the chat system's incoming webhook.
/// Without a URL, messages are only logged.
pub struct WebhookMessenger {
    http: reqwest::Client,
    url: Option<url::Url>,
}

impl WebhookMessenger {
    pub fn new(http: reqwest::Client, url: Option<&str>) -> anyhow::Result<Self> {
        let url = url.map(url::Url::parse).transpose()?;
        Ok(WebhookMessenger { http, url })
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn post_direct_message(&self, user_id: &str, text: &str) -> CalMirrorResult<()> {
        let Some(url) = &self.url else {
            tracing::info!(user = user_id, %text, "direct message");
            return Ok(());
        };

        let response = self
            .http
            .post(url.clone())
            .json(&DirectMessage { user_id, text })
            .send()
            .await
            .map_err(|e| CalMirrorError::Messaging(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CalMirrorError::Messaging(format!(
                "chat webhook answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}
