use oracle_client::OracleClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheStore;
use crate::error::PipelineError;
use crate::form::{FormFactory, ScreeningForm};
use crate::metrics;
use crate::model::ExecutionSummary;
use crate::phases::{
    checkbox, dropdown, finalize, keyword, multi_select, region, taxonomy, PhaseContext,
};
use crate::progress::ProgressSender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomySettings {
    /// Options per round-2 oracle call.
    pub batch_size: usize,
    pub max_expand_rounds: usize,
    pub expand_pause_ms: u64,
    pub batch_pause_ms: u64,
}

impl Default for TaxonomySettings {
    fn default() -> Self {
        Self {
            batch_size: 300,
            max_expand_rounds: 50,
            expand_pause_ms: 500,
            batch_pause_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub checkbox_pause_ms: u64,
    /// Wait after fills and before the final screenshot.
    pub settle_pause_ms: u64,
    pub taxonomy: TaxonomySettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            checkbox_pause_ms: 50,
            settle_pause_ms: 1000,
            taxonomy: TaxonomySettings::default(),
        }
    }
}

impl PipelineConfig {
    /// No pauses at all; used by tests and dry runs.
    pub fn without_pauses() -> Self {
        Self {
            checkbox_pause_ms: 0,
            settle_pause_ms: 0,
            taxonomy: TaxonomySettings {
                expand_pause_ms: 0,
                batch_pause_ms: 0,
                ..TaxonomySettings::default()
            },
        }
    }
}

/// Runs the phases in order over one fresh form per invocation.
pub struct ScreeningPipeline {
    forms: Arc<dyn FormFactory>,
    oracle: Arc<OracleClient>,
    cache: CacheStore,
    config: PipelineConfig,
}

impl ScreeningPipeline {
    pub fn new(forms: Arc<dyn FormFactory>, oracle: Arc<OracleClient>, cache: CacheStore) -> Self {
        Self {
            forms,
            oracle,
            cache,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// One full run. Returns the report, which is also pushed to `progress`.
    /// An error means no report was produced.
    #[instrument(name = "pipeline_run", skip_all, fields(guidance_len = guidance.len()))]
    pub async fn run(
        &self,
        guidance: &str,
        progress: &ProgressSender,
    ) -> Result<String, PipelineError> {
        let started = Instant::now();
        let outcome = match self.forms.create().await {
            Ok(mut form) => {
                let outcome = self.run_phases(form.as_mut(), guidance, progress).await;
                if let Err(err) = form.close().await {
                    warn!(target: "pipeline", ?err, "closing the form failed");
                }
                outcome
            }
            Err(err) => Err(err),
        };
        let label = if outcome.is_ok() { "completed" } else { "failed" };
        let elapsed = started.elapsed();
        metrics::record_pipeline_run(label, elapsed.as_secs_f64());
        info!(target: "pipeline", outcome = label, elapsed_ms = elapsed.as_millis() as u64, "pipeline run finished");
        outcome
    }

    async fn run_phases(
        &self,
        form: &mut dyn ScreeningForm,
        guidance: &str,
        progress: &ProgressSender,
    ) -> Result<String, PipelineError> {
        progress.notice("🚀 Opening the advanced search form...");
        form.open().await?;
        match form.dismiss_login_popup().await {
            Ok(true) => progress.notice("  - Closed the login popup"),
            Ok(false) => {}
            Err(err) => debug!(target: "pipeline", ?err, "login popup dismissal failed"),
        }

        let mut summary = ExecutionSummary::default();
        let mut ctx = PhaseContext {
            form,
            oracle: &self.oracle,
            cache: &self.cache,
            progress,
            guidance,
            config: &self.config,
        };
        ctx.capture("form opened").await;

        keyword::run(&mut ctx, &mut summary).await;
        region::run(&mut ctx, &mut summary).await;
        checkbox::run(&mut ctx, &mut summary).await;
        multi_select::run(&mut ctx, &mut summary).await;
        dropdown::run(&mut ctx, &mut summary).await;
        taxonomy::run(&mut ctx, &mut summary).await;
        Ok(finalize::run(&mut ctx, &summary).await)
    }
}
