use async_trait::async_trait;
use browser_driver::DriverError;
use std::time::Duration;

use crate::error::PipelineError;
use crate::model::{FilterElement, TaxonomyNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOutcome {
    Checked,
    AlreadyChecked,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Checked,
    AlreadyChecked,
    NotFound,
}

impl CheckOutcome {
    pub fn is_selected(self) -> bool {
        matches!(self, Self::Checked | Self::AlreadyChecked)
    }
}

impl From<RegionOutcome> for CheckOutcome {
    fn from(outcome: RegionOutcome) -> Self {
        match outcome {
            RegionOutcome::Checked => Self::Checked,
            RegionOutcome::AlreadyChecked => Self::AlreadyChecked,
            RegionOutcome::NotFound => Self::NotFound,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiSelectOutcome {
    pub applied: Vec<String>,
    pub missing: Vec<String>,
    /// The menu stayed open and was hidden by force.
    pub force_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Closed,
    Missing,
}

/// Site-level operations over one live page of the advanced search form.
///
/// Element-level failures come back as `Ok` values (`NotFound`, `false`,
/// `0`) or `Err` with a `DriverError`; callers log and skip both.
#[async_trait]
pub trait ScreeningForm: Send {
    /// Navigates to the form and waits for the filter container.
    async fn open(&mut self) -> Result<(), DriverError>;

    async fn dismiss_login_popup(&mut self) -> Result<bool, DriverError>;

    async fn keyword_input_present(&mut self) -> Result<bool, DriverError>;

    async fn fill_keywords(&mut self, text: &str) -> Result<(), DriverError>;

    async fn search_region(&mut self, region: &str) -> Result<RegionOutcome, DriverError>;

    async fn close_region_picker(&mut self) -> Result<(), DriverError>;

    async fn collect_checkboxes(&mut self) -> Result<Vec<FilterElement>, DriverError>;

    /// Re-locates the checkbox by category and label and checks it if needed.
    async fn check_checkbox(
        &mut self,
        category: &str,
        label: &str,
    ) -> Result<CheckOutcome, DriverError>;

    async fn collect_multi_selects(&mut self) -> Result<Vec<FilterElement>, DriverError>;

    async fn apply_multi_select(
        &mut self,
        menu: &FilterElement,
        options: &[String],
    ) -> Result<MultiSelectOutcome, DriverError>;

    async fn collect_dropdowns(&mut self) -> Result<Vec<FilterElement>, DriverError>;

    /// Opens a flat menu and clicks the first option containing `choice`.
    async fn apply_flat_choice(
        &mut self,
        menu: &FilterElement,
        choice: &str,
    ) -> Result<bool, DriverError>;

    /// Clicks `(group_index, choice_index)` pairs; returns how many landed.
    async fn apply_grouped_choices(
        &mut self,
        menu: &FilterElement,
        pairs: &[(usize, usize)],
    ) -> Result<usize, DriverError>;

    async fn open_taxonomy(&mut self) -> Result<bool, DriverError>;

    /// Expands every currently collapsed node once; returns how many toggled.
    async fn expand_taxonomy_batch(&mut self) -> Result<usize, DriverError>;

    async fn collect_taxonomy(&mut self) -> Result<Vec<TaxonomyNode>, DriverError>;

    /// Checks the named nodes in one pass; returns the labels now checked.
    async fn check_taxonomy_nodes(&mut self, labels: &[String])
        -> Result<Vec<String>, DriverError>;

    async fn confirm(&mut self) -> Result<ConfirmOutcome, DriverError>;

    /// PNG bytes.
    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError>;

    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Creates one form, and one page, per pipeline run.
#[async_trait]
pub trait FormFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn ScreeningForm>, PipelineError>;
}
