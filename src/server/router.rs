use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use super::chat::chat_handler;
use super::state::ServeState;
use crate::{build_info, metrics};

pub fn build_router(state: ServeState) -> Router {
    metrics::register_metrics();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/chat", post(chat_handler))
        .layer(cors)
        .with_state(state)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Screening agent backend is running.",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": build_info::GIT_HASH,
        "build_date": build_info::BUILD_DATE,
    }))
}

async fn health_handler(State(state): State<ServeState>) -> Json<serde_json::Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(json!({ "status": "ok", "uptime_secs": uptime }))
}

async fn metrics_handler() -> Response {
    match metrics::render() {
        Some((format_type, body)) => match HeaderValue::from_str(&format_type) {
            Ok(value) => ([(header::CONTENT_TYPE, value)], body).into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response(),
        },
        None => (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response(),
    }
}
