//! Knowledge base collaborators: an HTTP retrieval service, or nothing.

use std::time::Duration;

use agent_core::{AgentError, KnowledgeBase, Passage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    passages: Vec<Passage>,
}

/// Calls `POST {endpoint}/query` on an external retrieval service.
pub struct HttpKnowledgeBase {
    client: Client,
    endpoint: String,
}

impl HttpKnowledgeBase {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AgentError::knowledge_base(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<Passage>, AgentError> {
        let url = format!("{}/query", self.endpoint);
        debug!(target: "controller", %url, top_k, "querying knowledge base");
        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query: text, top_k })
            .send()
            .await
            .map_err(|err| AgentError::knowledge_base(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::knowledge_base(format!("status {status}: {body}")));
        }
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|err| AgentError::knowledge_base(format!("undecodable reply: {err}")))?;
        Ok(parsed.passages)
    }
}

/// Fixed passages; empty when no retrieval service is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    passages: Vec<Passage>,
}

impl StaticKnowledgeBase {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn query(&self, _text: &str, top_k: usize) -> Result<Vec<Passage>, AgentError> {
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{KnowledgeGateway, NO_RESULT_MESSAGE};
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_static_base_reports_no_result() {
        let gateway = KnowledgeGateway::new(Arc::new(StaticKnowledgeBase::default()));
        assert_eq!(gateway.query("汽车玻璃").await, NO_RESULT_MESSAGE);
    }

    #[test]
    fn response_passages_decode() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"passages":[{"source":"a.md","text":"整车厂","score":0.7}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.passages[0].source, "a.md");
        let empty: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.passages.is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let base = HttpKnowledgeBase::new("http://127.0.0.1:9/", Duration::from_millis(200)).unwrap();
        assert!(base.query("x", 3).await.is_err());
    }
}
