//! Push notifications from the remote calendar.

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Deserialize;

use calmirror_core::constants::{MSG_CONNECT_FIRST, MSG_HANDSHAKE};
use calmirror_core::messenger::post_or_log;
use calmirror_core::{CalMirrorError, WebhookNotification, WebhookOutcome};

use crate::routes::AppError;
use crate::state::AppState;

const CHANNEL_ID: &str = "x-goog-channel-id";
const RESOURCE_ID: &str = "x-goog-resource-id";
const RESOURCE_STATE: &str = "x-goog-resource-state";
const CHANNEL_TOKEN: &str = "x-goog-channel-token";

pub fn router() -> Router<AppState> {
    Router::new().route("/watch", post(watch))
}

#[derive(Deserialize)]
pub struct WatchQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, AppError> {
    header(headers, name).ok_or_else(|| AppError::bad_request(format!("Missing header {name}")))
}

/// POST /watch?userId=... - Callback for a watch channel
///
/// Answers 200 once the request parses, whatever happens to the sync; the remote
/// keeps retrying otherwise.
async fn watch(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let notification = WebhookNotification {
        user_id: query.user_id,
        channel_id: required_header(&headers, CHANNEL_ID)?,
        resource_id: required_header(&headers, RESOURCE_ID)?,
        resource_state: required_header(&headers, RESOURCE_STATE)?,
        token: header(&headers, CHANNEL_TOKEN),
    };
    let user_id = notification.user_id.as_str();
    let messenger = state.coordinator.messenger();

    match state.watch.handle_notification(&notification).await {
        Ok(WebhookOutcome::Handshake) => {
            post_or_log(messenger, user_id, MSG_HANDSHAKE).await;
        }
        Ok(WebhookOutcome::Ignored) => {
            tracing::debug!(user = user_id, channel = %notification.channel_id, "webhook ignored");
        }
        Ok(WebhookOutcome::Synced(report)) => {
            tracing::debug!(user = user_id, changes = report.changes, "webhook sync done");
        }
        Err(CalMirrorError::UserNotConnected(_)) => {
            post_or_log(messenger, user_id, MSG_CONNECT_FIRST).await;
        }
        Err(e) => {
            tracing::error!(user = user_id, error = %e, "webhook sync failed");
        }
    }

    Ok(StatusCode::OK)
}
