//! Stored OAuth sessions, refreshed when expired.
//!
//! One TOML file per user under the sessions directory. The file is written by
//! the OAuth flow (outside this crate) and rewritten here after each refresh.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use calmirror_core::store::path_segment;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth client credentials of the deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_tokens(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        SessionData {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

pub fn session_path(sessions_dir: &Path, user_id: &str) -> PathBuf {
    sessions_dir.join(format!("{}.toml", path_segment(user_id)))
}

/// `Ok(None)` when the user never completed OAuth.
pub async fn load(path: &Path) -> Result<Option<SessionData>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read Google session from {}", path.display()));
        }
    };

    let data = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse Google session from {}", path.display()))?;
    Ok(Some(data))
}

pub async fn save(path: &Path, data: &SessionData) -> Result<()> {
    let contents = toml::to_string_pretty(data).context("Failed to serialize session")?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write session to {}", path.display()))?;

    // Owner-only, the file holds OAuth tokens
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Delete the session file. A missing file is not an error.
pub async fn remove(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove session {}", path.display()))
        }
    }
}

/// Exchange the refresh token for a new access token.
pub async fn refresh(
    http: &reqwest::Client,
    token_url: &str,
    credentials: &Credentials,
    data: &SessionData,
) -> Result<SessionData> {
    let response = http
        .post(token_url)
        .form(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("refresh_token", data.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await
        .context("Failed to send token refresh request")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Token refresh failed ({status}): {error_text}");
    }

    #[derive(Deserialize)]
    struct RefreshResponse {
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
    }

    let refreshed: RefreshResponse = response
        .json()
        .await
        .context("Failed to parse token refresh response")?;

    // Google usually keeps the old refresh token
    let refresh_token = refreshed
        .refresh_token
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| data.refresh_token.clone());

    Ok(SessionData::from_tokens(
        refreshed.access_token,
        refresh_token,
        refreshed.expires_in,
    ))
}
