use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::{AgentError, KnowledgeBase, KnowledgeGateway, Passage, ReactController};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use oracle_client::{BackendError, OracleBackend, OracleClient, RetryPolicy, Sleeper};
use screening_agent::server::{build_router, ServeState, SESSION_HEADER};
use screening_pipeline::{ProgressSender, ScreeningTool};
use tower::ServiceExt;

struct QueuedOracle {
    replies: Mutex<VecDeque<String>>,
}

#[async_trait]
impl OracleBackend for QueuedOracle {
    fn name(&self) -> &str {
        "queued"
    }

    async fn complete(&self, _prompt: &str, _credential: Option<&str>) -> Result<String, BackendError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::transport("no more replies"))
    }
}

struct NoWait;

#[async_trait]
impl Sleeper for NoWait {
    async fn sleep(&self, _duration: Duration) {}
}

struct EmptyKnowledge;

#[async_trait]
impl KnowledgeBase for EmptyKnowledge {
    async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<Passage>, AgentError> {
        Ok(Vec::new())
    }
}

struct IdleTool;

#[async_trait]
impl ScreeningTool for IdleTool {
    async fn run(&self, _guidance: String, _progress: ProgressSender) -> Option<String> {
        None
    }
}

fn router(replies: &[&str]) -> axum::Router {
    let oracle = Arc::new(QueuedOracle {
        replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
    });
    let client = OracleClient::new(oracle, Vec::new())
        .with_policy(RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
        })
        .with_sleeper(Arc::new(NoWait));
    let controller = ReactController::new(
        Arc::new(client),
        KnowledgeGateway::new(Arc::new(EmptyKnowledge)),
        Arc::new(IdleTool),
    );
    build_router(ServeState::new(Arc::new(controller)))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = router(&[])
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn root_banner_carries_version() {
    let response = router(&[])
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn metrics_are_exposed_in_text_format() {
    let response = router(&[])
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let response = router(&[])
        .oneshot(chat_request(r#"{"message":"   "}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("message is empty"));
}

#[tokio::test]
async fn chat_streams_wire_events_until_end_marker() {
    let reply = r#"{"thought":"region unknown","action":"respond_to_user","params":{"text":"Which region?\nProvince is enough."}}"#;
    let response = router(&[reply])
        .oneshot(chat_request(r#"{"message":"找汽车玻璃客户","session_id":"s-42"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SESSION_HEADER], "s-42");
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = body_text(response).await;
    let lines: Vec<&str> = body.split("\n\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.first().copied(), Some("data: [Thinking] The agent is thinking..."));
    assert!(lines.contains(&"data: [TEXT_RESPONSE]Which region?\\nProvince is enough."));
    assert_eq!(lines.last().copied(), Some("data: ---END_OF_STREAM---"));
}

#[tokio::test]
async fn chat_without_session_gets_generated_id() {
    let reply = r#"{"action":"respond_to_user","params":{"text":"hi"}}"#;
    let response = router(&[reply])
        .oneshot(chat_request(r#"{"message":"hello"}"#))
        .await
        .unwrap();
    let session = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();
    assert_eq!(session.len(), 36);
    assert!(body_text(response).await.ends_with("data: ---END_OF_STREAM---\n\n"));
}
