use async_trait::async_trait;

use crate::pipeline::ScreeningPipeline;
use crate::progress::ProgressSender;

/// The form-filling tool as the controller sees it.
#[async_trait]
pub trait ScreeningTool: Send + Sync {
    /// Runs one screening for `guidance`, streaming progress. Returns the
    /// report, or `None` when the run failed; failures are reported on
    /// `progress` before returning.
    async fn run(&self, guidance: String, progress: ProgressSender) -> Option<String>;
}

#[async_trait]
impl ScreeningTool for ScreeningPipeline {
    async fn run(&self, guidance: String, progress: ProgressSender) -> Option<String> {
        match ScreeningPipeline::run(self, &guidance, &progress).await {
            Ok(report) => Some(report),
            Err(err) => {
                progress.error(format!("{err}\n{err:?}"));
                None
            }
        }
    }
}
