//! Screening pipeline: collects the advanced-search filter controls, asks the
//! oracle which values apply to the guidance text, applies them and
//! synthesizes a report.

pub mod advanced_search;
pub mod cache;
pub mod error;
pub mod form;
pub mod metrics;
pub mod model;
pub mod phases;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod tool;

pub use advanced_search::{AdvancedSearchForm, ChromiumFormFactory, FormSelectors, FormTimings};
pub use cache::CacheStore;
pub use error::PipelineError;
pub use form::{
    CheckOutcome, ConfirmOutcome, FormFactory, MultiSelectOutcome, RegionOutcome, ScreeningForm,
};
pub use model::{
    Choice, ExecutionSummary, FilterElement, FilterKind, MenuSelection, SelectionGroup,
    TaxonomyNode,
};
pub use pipeline::{PipelineConfig, ScreeningPipeline, TaxonomySettings};
pub use phases::resolve_conflicts;
pub use progress::{progress_channel, ProgressDrain, ProgressMessage, ProgressSender};
pub use report::{render_readable, NEWLINE_TOKEN, REASON_TOKEN};
pub use tool::ScreeningTool;
