use browser_driver::DriverError;
use thiserror::Error;

/// Faults that end a pipeline run without a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("browser driver failure: {0}")]
    Driver(#[from] DriverError),

    #[error("screening form unavailable: {0}")]
    FormUnavailable(String),
}

impl PipelineError {
    pub fn form_unavailable(message: impl Into<String>) -> Self {
        Self::FormUnavailable(message.into())
    }
}
