#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use browser_driver::DriverError;
use oracle_client::{BackendError, OracleBackend, OracleClient};
use screening_pipeline::{
    CacheStore, CheckOutcome, ConfirmOutcome, FilterElement, FormFactory, MultiSelectOutcome,
    PipelineConfig, PipelineError, RegionOutcome, ScreeningForm, ScreeningPipeline, TaxonomyNode,
};

pub type Events = Arc<Mutex<Vec<String>>>;

/// In-memory stand-in for the advanced search page.
#[derive(Clone, Default)]
pub struct FakeForm {
    pub events: Events,
    pub fail_open: bool,
    pub keyword_input: bool,
    pub region_titles: Vec<String>,
    pub checked_regions: Vec<String>,
    pub checkboxes: Vec<FilterElement>,
    pub multi_selects: Vec<FilterElement>,
    pub dropdowns: Vec<FilterElement>,
    pub taxonomy: Option<Vec<TaxonomyNode>>,
    pub expand_batches: Vec<usize>,
}

impl FakeForm {
    pub fn new() -> Self {
        Self {
            keyword_input: true,
            ..Self::default()
        }
    }

    fn log(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl ScreeningForm for FakeForm {
    async fn open(&mut self) -> Result<(), DriverError> {
        self.log("open");
        if self.fail_open {
            return Err(DriverError::Navigation("net::ERR_CONNECTION_REFUSED".into()));
        }
        Ok(())
    }

    async fn dismiss_login_popup(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn keyword_input_present(&mut self) -> Result<bool, DriverError> {
        Ok(self.keyword_input)
    }

    async fn fill_keywords(&mut self, text: &str) -> Result<(), DriverError> {
        self.log(format!("fill {text}"));
        Ok(())
    }

    async fn search_region(&mut self, region: &str) -> Result<RegionOutcome, DriverError> {
        if self.checked_regions.iter().any(|r| r == region) {
            return Ok(RegionOutcome::AlreadyChecked);
        }
        if self.region_titles.iter().any(|r| r == region) {
            self.log(format!("region {region}"));
            self.checked_regions.push(region.to_string());
            return Ok(RegionOutcome::Checked);
        }
        Ok(RegionOutcome::NotFound)
    }

    async fn close_region_picker(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn collect_checkboxes(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.log("collect checkboxes");
        Ok(self.checkboxes.clone())
    }

    async fn check_checkbox(
        &mut self,
        category: &str,
        label: &str,
    ) -> Result<CheckOutcome, DriverError> {
        let Some(element) = self
            .checkboxes
            .iter_mut()
            .find(|e| e.category == category && e.label == label)
        else {
            return Ok(CheckOutcome::NotFound);
        };
        if element.checked {
            return Ok(CheckOutcome::AlreadyChecked);
        }
        element.checked = true;
        self.log(format!("check {category}/{label}"));
        Ok(CheckOutcome::Checked)
    }

    async fn collect_multi_selects(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.log("collect multi");
        Ok(self.multi_selects.clone())
    }

    async fn apply_multi_select(
        &mut self,
        menu: &FilterElement,
        options: &[String],
    ) -> Result<MultiSelectOutcome, DriverError> {
        let mut outcome = MultiSelectOutcome::default();
        for option in options {
            if menu.choices.iter().any(|c| &c.text == option) {
                outcome.applied.push(option.clone());
            } else {
                outcome.missing.push(option.clone());
            }
        }
        self.log(format!("multi {} {}", menu.label, outcome.applied.join("|")));
        Ok(outcome)
    }

    async fn collect_dropdowns(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.log("collect dropdowns");
        Ok(self.dropdowns.clone())
    }

    async fn apply_flat_choice(
        &mut self,
        menu: &FilterElement,
        choice: &str,
    ) -> Result<bool, DriverError> {
        let found = menu.choices.iter().any(|c| c.text.contains(choice));
        if found {
            self.log(format!("flat {} {choice}", menu.label));
        }
        Ok(found)
    }

    async fn apply_grouped_choices(
        &mut self,
        menu: &FilterElement,
        pairs: &[(usize, usize)],
    ) -> Result<usize, DriverError> {
        self.log(format!("grouped {} {pairs:?}", menu.label));
        Ok(pairs.len())
    }

    async fn open_taxonomy(&mut self) -> Result<bool, DriverError> {
        Ok(self.taxonomy.is_some())
    }

    async fn expand_taxonomy_batch(&mut self) -> Result<usize, DriverError> {
        let next = if self.expand_batches.is_empty() {
            0
        } else {
            self.expand_batches.remove(0)
        };
        self.log(format!("expand {next}"));
        Ok(next)
    }

    async fn collect_taxonomy(&mut self) -> Result<Vec<TaxonomyNode>, DriverError> {
        self.log("collect taxonomy");
        Ok(self.taxonomy.clone().unwrap_or_default())
    }

    async fn check_taxonomy_nodes(
        &mut self,
        labels: &[String],
    ) -> Result<Vec<String>, DriverError> {
        let known: Vec<String> = labels
            .iter()
            .filter(|label| {
                self.taxonomy
                    .as_ref()
                    .is_some_and(|nodes| nodes.iter().any(|n| &n.label == *label))
            })
            .cloned()
            .collect();
        self.log(format!("taxonomy {}", known.join("|")));
        Ok(known)
    }

    async fn confirm(&mut self) -> Result<ConfirmOutcome, DriverError> {
        self.log("confirm");
        Ok(ConfirmOutcome::Confirmed)
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        Ok(if full_page { vec![9, 9] } else { vec![1] })
    }

    async fn pause(&mut self, _duration: Duration) {}

    async fn close(&mut self) -> Result<(), DriverError> {
        self.log("close");
        Ok(())
    }
}

pub struct FakeFactory {
    pub form: FakeForm,
}

#[async_trait]
impl FormFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn ScreeningForm>, PipelineError> {
        Ok(Box::new(self.form.clone()))
    }
}

type Rule = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Oracle backend answering by prompt content. Unmatched prompts get `{}`.
#[derive(Default)]
pub struct PromptBackend {
    rules: Vec<Rule>,
    prompts: Mutex<Vec<String>>,
}

impl PromptBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, needle: &'static str, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        self.rules.push(Box::new(move |prompt: &str| {
            prompt.contains(needle).then(|| reply.clone())
        }));
        self
    }

    pub fn rule(mut self, rule: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OracleBackend for PromptBackend {
    fn name(&self) -> &str {
        "prompt-keyed"
    }

    async fn complete(&self, prompt: &str, _credential: Option<&str>) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .rules
            .iter()
            .find_map(|rule| rule(prompt))
            .unwrap_or_else(|| "{}".to_string()))
    }
}

pub const KEYWORDS: &str = "搜索关键词";
pub const REGIONS: &str = "行政区域";
pub const CHECKBOXES: &str = "需要勾选的复选框";
pub const MULTI: &str = "多选下拉菜单";
pub const DROPDOWNS: &str = "下拉菜单需要选择";
pub const TOP_LEVEL: &str = "【行业大类】";
pub const BATCH: &str = "待选细分行业列表";

pub fn pipeline(form: FakeForm, backend: Arc<PromptBackend>, cache: CacheStore) -> ScreeningPipeline {
    let oracle = Arc::new(OracleClient::new(backend, Vec::new()));
    ScreeningPipeline::new(Arc::new(FakeFactory { form }), oracle, cache)
        .with_config(PipelineConfig::without_pauses())
}

pub fn node(label: &str, depth: usize, top: &str, expandable: bool) -> TaxonomyNode {
    TaxonomyNode {
        label: label.to_string(),
        depth,
        top_level: top.to_string(),
        expandable,
        selectable: true,
        selected: false,
    }
}

pub fn events(form: &FakeForm) -> Vec<String> {
    form.events.lock().unwrap().clone()
}
