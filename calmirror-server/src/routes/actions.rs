//! Links embedded in notifications: answering invitations and deleting events.

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    response::Html,
    routing::get,
};
use serde::Deserialize;

use calmirror_core::ResponseStatus;

use crate::routes::{AppError, acting_user};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/handleresponse", get(handle_response))
        .route("/delete", get(delete_event))
}

#[derive(Deserialize)]
pub struct ResponseQuery {
    pub evtid: String,
    pub response: String,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub evtid: String,
}

fn page(message: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><body><p>{message}</p></body></html>"
    ))
}

/// GET /handleresponse?evtid=...&response=accepted|declined|tentative
async fn handle_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ResponseQuery>,
) -> Result<Html<String>, AppError> {
    let user_id = acting_user(&headers)?;
    let response = ResponseStatus::from_answer(&query.response).ok_or_else(|| {
        AppError::bad_request(format!("Unknown response: {}", query.response))
    })?;

    state
        .actions
        .respond(&user_id, &query.evtid, response)
        .await?;

    Ok(page("Your response has been recorded. You can close this window."))
}

/// GET /delete?evtid=...
async fn delete_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Html<String>, AppError> {
    let user_id = acting_user(&headers)?;

    let deleted = state.actions.delete_event(&user_id, &query.evtid).await?;
    let message = if deleted {
        "The event has been deleted. You can close this window."
    } else {
        "You can only delete events that you have created."
    };

    Ok(page(message))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::USER_ID_HEADER;
    use crate::routes::test_support::{TestApp, event};

    fn get(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut request = Request::get(uri);
        if let Some(user) = user {
            request = request.header(USER_ID_HEADER, user);
        }
        request.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn accepting_updates_the_remote() {
        let app = TestApp::new(&["u1"], &[]).await;
        app.remote.state.lock().unwrap().events.push(event("e1", false));

        let response = app
            .router
            .oneshot(get("/handleresponse?evtid=e1&response=accepted", Some("u1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let updated = app.remote.state.lock().unwrap().updated.clone();
        assert_eq!(updated.len(), 1);
        assert_eq!(
            updated[0].viewer().unwrap().response_status,
            calmirror_core::ResponseStatus::Accepted
        );
        assert_eq!(
            app.messenger.texts(),
            vec!["Success! Event _Event e1_ response has been updated.".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_answer_is_rejected() {
        let app = TestApp::new(&["u1"], &[]).await;

        let response = app
            .router
            .oneshot(get("/handleresponse?evtid=e1&response=maybe", Some("u1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn actions_require_a_user() {
        let app = TestApp::new(&["u1"], &[]).await;

        let response = app
            .router
            .oneshot(get("/delete?evtid=e1", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn organizer_can_delete() {
        let app = TestApp::new(&["u1"], &[]).await;
        app.remote.state.lock().unwrap().events.push(event("e1", true));

        let response = app
            .router
            .oneshot(get("/delete?evtid=e1", Some("u1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.remote.state.lock().unwrap().deleted, vec!["e1"]);
    }

    #[tokio::test]
    async fn guest_cannot_delete() {
        let app = TestApp::new(&["u1"], &[]).await;
        app.remote.state.lock().unwrap().events.push(event("e1", false));

        let response = app
            .router
            .oneshot(get("/delete?evtid=e1", Some("u1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(app.remote.state.lock().unwrap().deleted.is_empty());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("only delete events"));
    }

    #[tokio::test]
    async fn missing_event_is_not_found() {
        let app = TestApp::new(&["u1"], &[]).await;

        let response = app
            .router
            .oneshot(get("/delete?evtid=nope", Some("u1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
