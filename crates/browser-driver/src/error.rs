use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no element matches selector `{0}`")]
    ElementNotFound(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("devtools protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound(selector.into())
    }
}
