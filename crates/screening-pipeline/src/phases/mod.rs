//! The sequential phases of a pipeline run. Each phase reads the shared
//! [`PhaseContext`], writes only into the run's [`ExecutionSummary`] and
//! handles its own failures.

pub mod checkbox;
pub mod dropdown;
pub mod finalize;
pub mod keyword;
pub mod multi_select;
pub mod region;
pub mod taxonomy;

use oracle_client::OracleClient;
use tracing::warn;

use crate::cache::CacheStore;
use crate::form::ScreeningForm;
use crate::model::FilterElement;
use crate::pipeline::PipelineConfig;
use crate::progress::ProgressSender;

pub use taxonomy::resolve_conflicts;

/// Everything a phase may touch during one run.
pub struct PhaseContext<'a> {
    pub form: &'a mut dyn ScreeningForm,
    pub oracle: &'a OracleClient,
    pub cache: &'a CacheStore,
    pub progress: &'a ProgressSender,
    pub guidance: &'a str,
    pub config: &'a PipelineConfig,
}

impl PhaseContext<'_> {
    /// Pushes a viewport screenshot to the caller. Failures are logged only.
    pub async fn capture(&mut self, caption: &str) {
        match self.form.screenshot(false).await {
            Ok(png) => {
                self.progress.screenshot(&png);
                self.progress.notice(format!("📸 Screen updated: {caption}"));
            }
            Err(err) => warn!(target: "pipeline", ?err, caption, "screenshot failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Collection {
    Checkboxes,
    MultiSelects,
    Dropdowns,
}

impl Collection {
    pub(crate) fn cache_key(self) -> &'static str {
        match self {
            Self::Checkboxes => "checkbox_data.json",
            Self::MultiSelects => "multi_select_data.json",
            Self::Dropdowns => "dropdown_complete_data.json",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Checkboxes => "checkbox",
            Self::MultiSelects => "multi-select menu",
            Self::Dropdowns => "dropdown menu",
        }
    }
}

/// Loads a collection from cache or scans the page and caches the result.
/// An empty or failed scan is not cached.
pub(crate) async fn cached_collection(
    ctx: &mut PhaseContext<'_>,
    collection: Collection,
) -> Vec<FilterElement> {
    let key = collection.cache_key();
    if let Some(cached) = ctx.cache.load::<Vec<FilterElement>>(key).await {
        ctx.progress.notice(format!(
            "  - Loaded {} {} controls from cache ({key})",
            cached.len(),
            collection.label()
        ));
        return cached;
    }

    ctx.progress
        .notice(format!("  - Scanning the page for {} controls...", collection.label()));
    let scanned = match collection {
        Collection::Checkboxes => ctx.form.collect_checkboxes().await,
        Collection::MultiSelects => ctx.form.collect_multi_selects().await,
        Collection::Dropdowns => ctx.form.collect_dropdowns().await,
    };
    match scanned {
        Ok(elements) => {
            ctx.progress.notice(format!(
                "  - Collected {} {} controls",
                elements.len(),
                collection.label()
            ));
            if !elements.is_empty() {
                ctx.cache.store(key, &elements).await;
            }
            elements
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, key, "collection failed");
            ctx.progress
                .notice(format!("  - Could not collect {} controls: {err}", collection.label()));
            Vec::new()
        }
    }
}
