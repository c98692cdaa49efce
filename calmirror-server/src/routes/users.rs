//! Account lifecycle, called by the chat system's slash commands.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};

use calmirror_core::SyncReport;
use calmirror_core::user::{UserAccount, UserDirectory};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/connect", post(connect))
        .route("/users/{id}/disconnect", post(disconnect))
        .route("/users/{id}/sync", post(sync))
}

/// POST /users/:id/connect - Register the user if needed and mirror their calendar
async fn connect(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SyncReport>, AppError> {
    if state.directory.get_user(&user_id).await?.is_none() {
        state.directory.save(&UserAccount::new(&user_id)).await?;
        tracing::info!(user = %user_id, "registered user");
    }

    let report = state.actions.connect(&user_id).await?;
    Ok(Json(report))
}

/// POST /users/:id/disconnect
async fn disconnect(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.actions.disconnect(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/:id/sync - Sync now instead of waiting for the sweep
async fn sync(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SyncReport>, AppError> {
    let report = state.coordinator.sync(&user_id).await?;
    Ok(Json(report))
}
