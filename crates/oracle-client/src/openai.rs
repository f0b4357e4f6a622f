use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::OracleBackend;
use crate::errors::BackendError;

/// Configuration for an OpenAI-compatible chat completion endpoint
/// (ModelScope inference, self-hosted gateways, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
    /// Sends `enable_thinking: false` for reasoning models that support it.
    pub disable_thinking: bool,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api-inference.modelscope.cn/v1".to_string(),
            model: "Qwen/Qwen3-32B".to_string(),
            timeout: Duration::from_secs(120),
            disable_thinking: true,
        }
    }
}

pub struct OpenAiCompatibleBackend {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleBackend {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| BackendError::transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OracleBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            enable_thinking: self.config.disable_thinking.then_some(false),
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = credential {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::transport(format!("chat completion request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(BackendError::from_status(status.as_u16(), text));
        }

        let reply: ChatCompletionResponse = response.json().await.map_err(|err| {
            BackendError::malformed(format!("chat completion decode failed: {err}"))
        })?;
        let text: String = reply
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect();
        if text.trim().is_empty() {
            return Err(BackendError::malformed("chat completion carried no content"));
        }
        debug!(target: "oracle", chars = text.len(), model = %self.config.model, "chat completion received");
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_thinking: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_thinking_flag_when_disabled() {
        let body = ChatCompletionRequest {
            model: "m".into(),
            messages: vec![],
            stream: false,
            enable_thinking: None,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert!(value.get("enable_thinking").is_none());
    }

    #[test]
    fn joins_choice_contents() {
        let reply: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "{\"a\":"}}, {"message": {"content": "1}"}}]}"#,
        )
        .expect("decode");
        let text: String = reply
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect();
        assert_eq!(text, "{\"a\":1}");
    }
}
