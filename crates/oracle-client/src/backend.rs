use async_trait::async_trait;

use crate::errors::BackendError;

/// A text-completion service: one prompt in, free text out.
///
/// Implementations perform exactly one request per call. Retry, backoff and
/// credential rotation belong to [`crate::OracleClient`].
#[async_trait]
pub trait OracleBackend: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, credential: Option<&str>)
        -> Result<String, BackendError>;
}
