//! `RemoteCalendar` over the Calendar v3 REST API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use calmirror_core::remote::{
    ChannelRequest, EventPage, ListQuery, RemoteCalendar, WatchChannel,
};
use calmirror_core::{CalMirrorError, CalMirrorResult, MirroredEvent, ResponseStatus};

use crate::convert::{FromGoogle, ToGoogle};
use crate::wire::{
    AttendeesPatch, CalendarResource, ErrorEnvelope, EventsList, GoogleEvent, StopBody, WatchBody,
};

pub const API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const PRIMARY: &str = "primary";

/// What a failed request was doing. Decides how a 404/410 is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    List { incremental: bool },
    Lookup,
    Write,
}

/// Client for one user's primary calendar.
pub struct GoogleCalendar {
    http: reqwest::Client,
    base: Url,
    access_token: String,
    page_size: usize,
}

impl GoogleCalendar {
    pub fn new(http: reqwest::Client, access_token: String) -> CalMirrorResult<Self> {
        Self::with_base_url(http, access_token, API_BASE)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        access_token: String,
        base: &str,
    ) -> CalMirrorResult<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| CalMirrorError::Config(format!("Invalid API base '{base}': {e}")))?;
        // Relative joins need the trailing slash
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(GoogleCalendar {
            http,
            base,
            access_token,
            page_size: calmirror_core::constants::DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn url(&self, path: &str) -> CalMirrorResult<Url> {
        self.base
            .join(path)
            .map_err(|e| CalMirrorError::Config(format!("Invalid API path '{path}': {e}")))
    }

    fn request(&self, method: Method, path: &str) -> CalMirrorResult<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .bearer_auth(&self.access_token))
    }

    fn event_path(event_id: &str) -> String {
        format!("calendars/{PRIMARY}/events/{}", encode_segment(event_id))
    }

    async fn send(&self, request: RequestBuilder, call: Call) -> CalMirrorResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = error_message(response).await;
        Err(status_error(status, call, message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        call: Call,
    ) -> CalMirrorResult<T> {
        self.send(request, call)
            .await?
            .json()
            .await
            .map_err(|e| CalMirrorError::Remote(format!("Unexpected response body: {e}")))
    }
}

#[async_trait]
impl RemoteCalendar for GoogleCalendar {
    async fn list_events(
        &self,
        query: &ListQuery,
        page_token: Option<&str>,
    ) -> CalMirrorResult<EventPage> {
        let mut params: Vec<(&str, String)> = vec![("maxResults", self.page_size.to_string())];
        match query {
            ListQuery::Window { time_min, time_max } => {
                params.push(("singleEvents", "true".into()));
                params.push(("timeMin", time_min.to_rfc3339()));
                params.push(("timeMax", time_max.to_rfc3339()));
            }
            ListQuery::Changes { sync_token } => {
                params.push(("showDeleted", "true".into()));
                params.push(("syncToken", sync_token.clone()));
            }
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let request = self
            .request(Method::GET, &format!("calendars/{PRIMARY}/events"))?
            .query(&params);
        let list: EventsList = self
            .send_json(request, Call::List { incremental: query.is_incremental() })
            .await?;

        Ok(EventPage {
            events: list.items.into_iter().map(MirroredEvent::from_google).collect(),
            next_page_token: list.next_page_token,
            next_sync_token: list.next_sync_token,
        })
    }

    async fn time_zone(&self) -> CalMirrorResult<String> {
        let request = self.request(Method::GET, &format!("calendars/{PRIMARY}"))?;
        let calendar: CalendarResource = self.send_json(request, Call::Lookup).await?;
        Ok(calendar.time_zone)
    }

    async fn get_event(&self, event_id: &str) -> CalMirrorResult<MirroredEvent> {
        let request = self.request(Method::GET, &Self::event_path(event_id))?;
        let event: GoogleEvent = self.send_json(request, Call::Lookup).await?;
        Ok(MirroredEvent::from_google(event))
    }

    async fn respond_to_event(
        &self,
        event_id: &str,
        response: ResponseStatus,
    ) -> CalMirrorResult<MirroredEvent> {
        let request = self.request(Method::GET, &Self::event_path(event_id))?;
        let mut event: GoogleEvent = self.send_json(request, Call::Lookup).await?;

        let viewer = event
            .attendees
            .iter_mut()
            .find(|a| a.is_self)
            .ok_or_else(|| CalMirrorError::Remote(format!("Not invited to event {event_id}")))?;
        viewer.response_status = Some(response.as_str().to_string());

        // Attendance only, so no update mail goes out to the other guests
        let request = self
            .request(Method::PATCH, &Self::event_path(event_id))?
            .json(&AttendeesPatch {
                attendees: &event.attendees,
            });
        let updated: GoogleEvent = self.send_json(request, Call::Write).await?;
        Ok(MirroredEvent::from_google(updated))
    }

    async fn delete_event(&self, event_id: &str) -> CalMirrorResult<()> {
        let request = self
            .request(Method::DELETE, &Self::event_path(event_id))?
            .query(&[("sendUpdates", "all")]);
        self.send(request, Call::Write).await?;
        Ok(())
    }

    async fn insert_event(&self, event: &MirroredEvent) -> CalMirrorResult<MirroredEvent> {
        let mut body = serde_json::to_value(event.to_google())?;
        if let (Some(start), Some(end)) = (&event.start, &event.end) {
            body["start"] = time_body(start);
            body["end"] = time_body(end);
        }

        let request = self
            .request(Method::POST, &format!("calendars/{PRIMARY}/events"))?
            .json(&body);
        let created: GoogleEvent = self.send_json(request, Call::Write).await?;
        Ok(MirroredEvent::from_google(created))
    }

    async fn watch(&self, request: &ChannelRequest) -> CalMirrorResult<WatchChannel> {
        let body = WatchBody {
            id: &request.id,
            kind: "web_hook",
            address: &request.address,
            token: &request.token,
        };
        let http_request = self
            .request(Method::POST, &format!("calendars/{PRIMARY}/events/watch"))?
            .json(&body);
        self.send_json(http_request, Call::Write).await
    }

    async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> CalMirrorResult<()> {
        let request = self.request(Method::POST, "channels/stop")?.json(&StopBody {
            id: channel_id,
            resource_id,
        });
        self.send(request, Call::Write).await?;
        Ok(())
    }
}

fn time_body(time: &calmirror_core::EventTime) -> serde_json::Value {
    match time {
        calmirror_core::EventTime::DateTime(dt) => serde_json::json!({ "dateTime": dt.to_rfc3339() }),
        calmirror_core::EventTime::Date(d) => {
            serde_json::json!({ "date": d.format("%Y-%m-%d").to_string() })
        }
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

fn transport_error(e: reqwest::Error) -> CalMirrorError {
    CalMirrorError::Transient(e.to_string())
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or(text)
}

fn status_error(status: StatusCode, call: Call, message: String) -> CalMirrorError {
    match (status, call) {
        (StatusCode::GONE, Call::List { incremental: true }) => CalMirrorError::TokenInvalid,
        (StatusCode::NOT_FOUND | StatusCode::GONE, Call::Lookup | Call::Write) => {
            CalMirrorError::RemoteNotFound(message)
        }
        (StatusCode::UNAUTHORIZED, _) => {
            CalMirrorError::Remote(format!("Access token rejected: {message}"))
        }
        (StatusCode::TOO_MANY_REQUESTS, _) => CalMirrorError::Transient(message),
        (s, _) if s.is_server_error() => CalMirrorError::Transient(format!("{s}: {message}")),
        (s, _) => CalMirrorError::Remote(format!("{s}: {message}")),
    }
}
