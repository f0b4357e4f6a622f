use thiserror::Error;

/// Failures reported by a single backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The credential used for the call hit its rate limit (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The backend rejected the request itself (HTTP 400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Transient server-side failure (HTTP 5xx).
    #[error("backend unavailable ({status}): {body}")]
    Unavailable { status: u16, body: String },

    /// Network failure or an unexpected status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The reply arrived but did not carry any completion text.
    #[error("malformed backend reply: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Maps a non-success HTTP status onto the retry taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 => Self::RateLimited(body),
            400 => Self::BadRequest(body),
            500..=599 => Self::Unavailable { status, body },
            _ => Self::Transport(format!("unexpected status {status}: {body}")),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::BadRequest(_) => "bad_request",
            Self::Unavailable { .. } => "unavailable",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Errors surfaced by [`crate::OracleClient`].
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: BackendError },

    #[error("oracle configuration error: {0}")]
    Config(String),
}

impl OracleError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_statuses() {
        assert_eq!(
            BackendError::from_status(429, "slow down").kind(),
            "rate_limited"
        );
        assert_eq!(BackendError::from_status(400, "bad").kind(), "bad_request");
        assert_eq!(BackendError::from_status(503, "down").kind(), "unavailable");
        assert_eq!(BackendError::from_status(500, "oops").kind(), "unavailable");
        assert_eq!(BackendError::from_status(404, "gone").kind(), "transport");
    }
}
