pub mod actions;
pub mod health;
pub mod users;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use calmirror_core::CalMirrorError;

use crate::state::AppState;

/// Header the chat system sets to the acting user on action links.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(actions::router())
        .merge(users::router())
        .with_state(state)
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error with the status it is answered with.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        AppError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<CalMirrorError> for AppError {
    fn from(err: CalMirrorError) -> Self {
        let status = match &err {
            CalMirrorError::UserNotConnected(_)
            | CalMirrorError::ChannelNotFound(_)
            | CalMirrorError::RemoteNotFound(_) => StatusCode::NOT_FOUND,
            CalMirrorError::Transient(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

/// The acting user of an action link.
pub fn acting_user(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Not authorized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        let status = |e: CalMirrorError| AppError::from(e).status();

        assert_eq!(
            status(CalMirrorError::UserNotConnected("u1".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(CalMirrorError::Transient("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(CalMirrorError::Store("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn acting_user_requires_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            acting_user(&headers).unwrap_err().status(),
            StatusCode::UNAUTHORIZED
        );

        headers.insert(USER_ID_HEADER, "u1".parse().unwrap());
        assert_eq!(acting_user(&headers).unwrap(), "u1");
    }
}
