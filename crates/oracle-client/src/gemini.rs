use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::OracleBackend;
use crate::errors::BackendError;

/// Configuration for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Full `...:generateContent` URL.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| BackendError::transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OracleBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, BackendError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };
        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = credential {
            request = request.header("X-goog-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::transport(format!("gemini request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(BackendError::from_status(status.as_u16(), text));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| BackendError::malformed(format!("gemini reply decode failed: {err}")))?;
        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .map(|text| text.trim().to_string())
            .ok_or_else(|| BackendError::malformed("gemini reply carried no candidate text"))?;
        debug!(target: "oracle", chars = text.len(), "gemini reply received");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
