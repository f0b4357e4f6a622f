use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::OracleBackend;
use crate::credentials::{key_hint, CredentialPool};
use crate::errors::{BackendError, OracleError};
use crate::metrics;
use crate::repair::{extract_json, extract_json_value};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};

/// Outcome of asking the oracle for a structured decision.
///
/// Every call site handles both arms: a decoded decision, or the raw text
/// that could not be decoded (empty when the backend never answered).
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply<T> {
    Decision(T),
    Malformed(String),
}

impl<T> OracleReply<T> {
    pub fn decision(self) -> Option<T> {
        match self {
            Self::Decision(value) => Some(value),
            Self::Malformed(_) => None,
        }
    }
}

pub struct OracleClient {
    backend: Arc<dyn OracleBackend>,
    credentials: CredentialPool,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl OracleClient {
    pub fn new(backend: Arc<dyn OracleBackend>, credentials: Vec<String>) -> Self {
        Self {
            backend,
            credentials: CredentialPool::new(credentials),
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Calls the backend under the retry policy.
    ///
    /// A rate-limited credential is swapped for the next one without using an
    /// attempt. Once every credential has been tried since the last wait, the
    /// client sleeps, doubles the delay, clears the tried set and counts one
    /// attempt. Every other failure counts one attempt and clears the tried
    /// set, so only an unbroken run of rate limits leads to that extra wait.
    /// Bad requests move straight on to the next credential; server and
    /// transport failures back off first.
    pub async fn try_complete_text(&self, prompt: &str) -> Result<String, OracleError> {
        let backend = self.backend.name().to_string();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_delay;
        let mut attempt = 0u32;
        let mut tried: HashSet<usize> = HashSet::new();
        let mut last_error = BackendError::transport("no attempt was made");

        while attempt < max_attempts {
            let credential = self.credentials.next();
            if let Some((slot, key)) = credential {
                if tried.contains(&slot) {
                    warn!(
                        target: "oracle",
                        %backend,
                        delay_ms = delay.as_millis() as u64,
                        "every credential tried; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    delay *= 2;
                    tried.clear();
                    attempt += 1;
                    if attempt >= max_attempts {
                        break;
                    }
                }
                tried.insert(slot);
                debug!(
                    target: "oracle",
                    %backend,
                    key = %key_hint(key),
                    attempt = attempt + 1,
                    max_attempts,
                    "calling oracle backend"
                );
            }

            let result = self
                .backend
                .complete(prompt, credential.map(|(_, key)| key))
                .await;
            match result {
                Ok(text) => {
                    metrics::record_attempt(&backend, "ok");
                    return Ok(text);
                }
                Err(err) => {
                    metrics::record_attempt(&backend, err.kind());
                    match &err {
                        BackendError::RateLimited(_) if credential.is_some() => {
                            warn!(
                                target: "oracle",
                                %backend,
                                key = %credential.map(|(_, key)| key_hint(key)).unwrap_or_default(),
                                "credential rate limited; switching to next credential"
                            );
                        }
                        BackendError::BadRequest(body) => {
                            warn!(target: "oracle", %backend, %body, "backend rejected request");
                            attempt += 1;
                            tried.clear();
                        }
                        BackendError::Unavailable { .. } | BackendError::RateLimited(_) => {
                            attempt += 1;
                            warn!(target: "oracle", %backend, error = %err, attempt, "backend unavailable");
                            if attempt < max_attempts {
                                self.sleeper.sleep(delay).await;
                                delay *= 2;
                            }
                            tried.clear();
                        }
                        BackendError::Transport(_) | BackendError::Malformed(_) => {
                            attempt += 1;
                            warn!(target: "oracle", %backend, error = %err, attempt, "oracle call failed");
                            if attempt < max_attempts {
                                self.sleeper.sleep(delay).await;
                                delay *= 2;
                            }
                            tried.clear();
                        }
                    }
                    last_error = err;
                }
            }
        }

        warn!(target: "oracle", %backend, attempts = attempt, "giving up on oracle call");
        Err(OracleError::Exhausted {
            attempts: attempt,
            last: last_error,
        })
    }

    /// Text completion that degrades to an empty string on failure.
    pub async fn complete_text(&self, prompt: &str) -> String {
        self.try_complete_text(prompt).await.unwrap_or_default()
    }

    /// Untyped structured result; `None` when nothing usable came back.
    pub async fn complete_json(&self, prompt: &str) -> Option<Value> {
        let text = self.complete_text(prompt).await;
        if text.is_empty() {
            return None;
        }
        let parsed = extract_json_value(&text);
        if parsed.is_none() {
            warn!(target: "oracle", raw = %text, "oracle reply is not valid JSON");
        }
        parsed
    }

    /// Typed decision; the raw text is kept when decoding fails.
    pub async fn decide<T: DeserializeOwned>(&self, prompt: &str) -> OracleReply<T> {
        let text = self.complete_text(prompt).await;
        if text.is_empty() {
            info!(target: "oracle", "oracle returned no text");
            return OracleReply::Malformed(text);
        }
        match extract_json::<T>(&text) {
            Ok(decision) => OracleReply::Decision(decision),
            Err(err) => {
                warn!(target: "oracle", %err, raw = %text, "failed to decode oracle decision");
                OracleReply::Malformed(text)
            }
        }
    }
}
