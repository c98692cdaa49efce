use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use calmirror_core::remote::{RemoteCalendar, RemoteConnector};
use calmirror_core::user::UserAccount;
use calmirror_core::{CalMirrorError, CalMirrorResult};

use crate::client::{API_BASE, GoogleCalendar};
use crate::session::{self, Credentials, TOKEN_URL};

/// Builds `GoogleCalendar` clients from the session files on disk.
pub struct GoogleConnector {
    http: reqwest::Client,
    sessions_dir: PathBuf,
    credentials: Credentials,
    api_base: String,
    token_url: String,
    page_size: usize,
}

impl GoogleConnector {
    /// Every request made through this connector gives up after `timeout`.
    pub fn new(
        sessions_dir: impl Into<PathBuf>,
        credentials: Credentials,
        timeout: Duration,
    ) -> CalMirrorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalMirrorError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(GoogleConnector {
            http,
            sessions_dir: sessions_dir.into(),
            credentials,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            page_size: calmirror_core::constants::DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_endpoints(mut self, api_base: &str, token_url: &str) -> Self {
        self.api_base = api_base.to_string();
        self.token_url = token_url.to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// A valid access token for the user, refreshed and saved if it expired.
    async fn access_token(&self, user_id: &str) -> CalMirrorResult<String> {
        let path = session::session_path(&self.sessions_dir, user_id);

        let data = session::load(&path)
            .await
            .map_err(|e| CalMirrorError::Store(format!("{e:#}")))?
            .ok_or_else(|| CalMirrorError::UserNotConnected(user_id.to_string()))?;

        if !data.is_expired(Utc::now()) {
            return Ok(data.access_token);
        }

        tracing::debug!(user = user_id, "refreshing Google access token");
        let refreshed = session::refresh(&self.http, &self.token_url, &self.credentials, &data)
            .await
            .map_err(|e| CalMirrorError::Remote(format!("{e:#}")))?;
        session::save(&path, &refreshed)
            .await
            .map_err(|e| CalMirrorError::Store(format!("{e:#}")))?;

        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl RemoteConnector for GoogleConnector {
    async fn connect(&self, account: &UserAccount) -> CalMirrorResult<Arc<dyn RemoteCalendar>> {
        let access_token = self.access_token(&account.user_id).await?;
        let calendar =
            GoogleCalendar::with_base_url(self.http.clone(), access_token, &self.api_base)?
                .with_page_size(self.page_size);
        Ok(Arc::new(calendar))
    }

    async fn forget(&self, user_id: &str) -> CalMirrorResult<()> {
        session::remove(&session::session_path(&self.sessions_dir, user_id))
            .await
            .map_err(|e| CalMirrorError::Store(format!("{e:#}")))
    }
}
