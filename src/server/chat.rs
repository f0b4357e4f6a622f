use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::state::ServeState;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[instrument(name = "chat", skip_all)]
pub async fn chat_handler(State(state): State<ServeState>, Json(request): Json<ChatRequest>) -> Response {
    if request.message.trim().is_empty() {
        warn!(target: "server", "chat request without a message");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message is empty" })),
        )
            .into_response();
    }
    let session_id = request
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(target: "server", session = %session_id, chars = request.message.chars().count(), "chat request");

    let events = state
        .controller
        .clone()
        .handle_message(session_id.clone(), request.message)
        .map(|event| Ok::<_, Infallible>(event.to_wire()));

    let mut response = Body::from_stream(events).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        headers.insert(SESSION_HEADER, value);
    }
    response
}
