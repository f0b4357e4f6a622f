//! [`ScreeningForm`] over the advanced search page, driven through a
//! [`BrowserDriver`].
//!
//! Most operations run one in-page script. Scripts are written as
//! `async (S, A) => ...` where `S` is the serialized [`FormSelectors`] table
//! and `A` the call arguments, so selectors stay configurable without
//! touching script text. Elements that need native input (typing) are
//! tagged with a data attribute and addressed by plain CSS afterwards.

use async_trait::async_trait;
use browser_driver::{BrowserDriver, ChromiumDriver, DriverConfig, DriverError, WaitState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::form::{
    CheckOutcome, ConfirmOutcome, FormFactory, MultiSelectOutcome, RegionOutcome, ScreeningForm,
};
use crate::model::{FilterElement, TaxonomyNode};

const REGION_INPUT_TAG: &str = "[data-screening-region-input]";

/// CSS selectors and marker texts of the advanced search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSelectors {
    pub target_url: String,
    pub login_close: String,
    pub filter_container: String,
    pub keyword_input: String,
    pub section_item: String,
    pub section_title: String,
    pub region_title_text: String,
    pub region_search_input: String,
    pub region_suggestion: String,
    pub checkbox_input: String,
    pub checkbox_item: String,
    pub checkbox_title: String,
    pub panel: String,
    pub panel_title: String,
    pub dropdown_trigger: String,
    pub multi_trigger: String,
    pub multi_wrapper: String,
    pub dropdown_body: String,
    pub cascader_level: String,
    pub select_container: String,
    pub radio_group: String,
    pub radio_group_title: String,
    pub radio_item: String,
    pub radio_input: String,
    pub taxonomy_title_text: String,
    pub taxonomy_trigger: String,
    pub taxonomy_modal: String,
    pub tree_root: String,
    pub tree_node: String,
    pub tree_title: String,
    pub tree_switcher: String,
    pub tree_switcher_closed: String,
    pub tree_checkbox: String,
    pub tree_checked: String,
    pub confirm_button: String,
    pub confirm_text: String,
    pub modal_close: String,
}

impl Default for FormSelectors {
    fn default() -> Self {
        let s = |v: &str| v.to_string();
        Self {
            target_url: s("https://www.qcc.com/web/search/advance?hasState=true"),
            login_close: s("span.qcc-login-modal-close"),
            filter_container: s(".advance-filters-container"),
            keyword_input: s(r#"input.qccd-input[placeholder="输入关键词"]"#),
            section_item: s("div.into-one-item"),
            section_title: s("div.into-one-title"),
            region_title_text: s("省份地区"),
            region_search_input: s("div.adv-selelct-cascader input.search-input"),
            region_suggestion: s("div.drop-container.qccd-dropdown-content li"),
            checkbox_input: s("input.qccd-checkbox-input"),
            checkbox_item: s(".click-container"),
            checkbox_title: s(".element-title-container"),
            panel: s(".advance-filters-panel"),
            panel_title: s(".advance-panel-title .title"),
            dropdown_trigger: s("div.drop-down-select-name.qccd-dropdown-trigger:not(.is-multi)"),
            multi_trigger: s(
                ".advance-filters-panel.advance-panel-sub-line .drop-down-select-name.is-multi.qccd-dropdown-trigger",
            ),
            multi_wrapper: s(".adv-common-select, .adv-common-cascader"),
            dropdown_body: s(".qccd-dropdown"),
            cascader_level: s(".dropdown-level"),
            select_container: s(".select-container"),
            radio_group: s(".select-item"),
            radio_group_title: s(".select-title"),
            radio_item: s(".radio-item"),
            radio_input: s("input.qccd-radio-input"),
            taxonomy_title_text: s("所属行业"),
            taxonomy_trigger: s(".trigger-container"),
            taxonomy_modal: s(".app-nmodal.modal.fade.pro-tree-modal.in"),
            tree_root: s("ul.qccd-tree"),
            tree_node: s("li.filter-node"),
            tree_title: s("span.qccd-tree-title > div.tree-item-title > span.text-dk"),
            tree_switcher: s("span.qccd-tree-switcher"),
            tree_switcher_closed: s("span.qccd-tree-switcher_close"),
            tree_checkbox: s("span.qccd-tree-checkbox > span.qccd-tree-checkbox-inner"),
            tree_checked: s("span.qccd-tree-checkbox.qccd-tree-checkbox-checked"),
            confirm_button: s("div.modal-footer div.btn.btn-primary"),
            confirm_text: s("确定"),
            modal_close: s("a.nclose"),
        }
    }
}

/// Waits used around page interactions, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormTimings {
    pub open_timeout_ms: u64,
    pub popup_settle_ms: u64,
    pub region_key_delay_ms: u64,
    pub suggestion_wait_ms: u64,
    pub modal_timeout_ms: u64,
    pub modal_settle_ms: u64,
}

impl Default for FormTimings {
    fn default() -> Self {
        Self {
            open_timeout_ms: 15_000,
            popup_settle_ms: 2_000,
            region_key_delay_ms: 50,
            suggestion_wait_ms: 800,
            modal_timeout_ms: 10_000,
            modal_settle_ms: 2_000,
        }
    }
}

impl FormTimings {
    pub fn immediate() -> Self {
        Self {
            open_timeout_ms: 1_000,
            popup_settle_ms: 0,
            region_key_delay_ms: 0,
            suggestion_wait_ms: 0,
            modal_timeout_ms: 1_000,
            modal_settle_ms: 0,
        }
    }
}

const PRELUDE: &str = r#"
const norm = (t) => String(t || '').replace(/<em>\s*<\/em>/g, '').replace(/\s+/g, ' ').trim();
const isShown = (el) => {
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
};
const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
const waitUntil = async (check, ms) => {
    const end = Date.now() + ms;
    while (Date.now() < end) {
        if (check()) return true;
        await sleep(50);
    }
    return check();
};
const panelTitle = (el, S) => {
    const panel = el.closest(S.panel);
    const title = panel ? panel.querySelector(S.panel_title) : null;
    return title ? norm(title.textContent) : '';
};
const labelOf = (text) => {
    let label = norm(text);
    if (label.length > 50) {
        label = label.split(' ')[0];
        if (label.length > 50) label = label.substring(0, 48) + '...';
    }
    return label;
};
const sectionByTitle = (S, text) => Array.from(document.querySelectorAll(S.section_item))
    .find((item) => {
        const title = item.querySelector(S.section_title);
        return norm(title ? title.textContent : item.textContent).includes(text);
    });
const visibleCheckboxes = (S) => {
    const root = document.querySelector(S.filter_container) || document;
    return Array.from(root.querySelectorAll(S.checkbox_input)).filter((input) => {
        const style = input.getAttribute('style') || '';
        return !style.includes('display: none') && !style.includes('visibility: hidden');
    });
};
const checkboxEntry = (input, S) => {
    const item = input.closest(S.checkbox_item);
    const title = item ? item.querySelector(S.checkbox_title) : null;
    return {
        category: panelTitle(input, S) || 'Other',
        label: title ? labelOf(title.textContent) : '',
    };
};
const findTrigger = (selector, label, position) => {
    const triggers = Array.from(document.querySelectorAll(selector));
    const titleOf = (el) => norm((el.querySelector('span') || el).textContent);
    return triggers.find((el) => titleOf(el) === label) || triggers[position] || null;
};
const treeLabel = (node, S) => {
    const title = node.querySelector(S.tree_title);
    return title ? norm(title.textContent) : '';
};
const treeNodeShown = (node) => node.offsetParent !== null
    && window.getComputedStyle(node).visibility !== 'hidden';
"#;

const TAG_REGION_INPUT: &str = r#"async (S, A) => {
    document.querySelectorAll('[data-screening-region-input]')
        .forEach((el) => el.removeAttribute('data-screening-region-input'));
    const section = sectionByTitle(S, S.region_title_text);
    const input = section ? section.querySelector(S.region_search_input) : null;
    if (!input) return false;
    input.setAttribute('data-screening-region-input', '1');
    return true;
}"#;

const PICK_REGION: &str = r#"async (S, A) => {
    const item = Array.from(document.querySelectorAll(S.region_suggestion))
        .find((li) => li.getAttribute('title') === A.region && isShown(li));
    if (!item) return 'missing';
    const box = item.querySelector(S.checkbox_input);
    if (!box) { item.click(); return 'checked'; }
    if (box.checked) return 'already';
    box.click();
    return 'checked';
}"#;

const CLOSE_REGION: &str = r#"async (S, A) => {
    const section = sectionByTitle(S, S.region_title_text);
    const title = section ? section.querySelector(S.section_title) : null;
    if (title) title.click();
    return !!title;
}"#;

const COLLECT_CHECKBOXES: &str = r#"async (S, A) => {
    const out = [];
    visibleCheckboxes(S).forEach((input, position) => {
        const entry = checkboxEntry(input, S);
        if (!entry.label) return;
        out.push({
            category: entry.category,
            label: entry.label,
            kind: 'checkbox',
            checked: !!input.checked,
            position,
        });
    });
    return out;
}"#;

const CHECK_CHECKBOX: &str = r#"async (S, A) => {
    const input = visibleCheckboxes(S).find((el) => {
        const entry = checkboxEntry(el, S);
        return entry.label === A.label && entry.category === A.category;
    });
    if (!input) return 'missing';
    if (input.checked) return 'already';
    input.click();
    return 'checked';
}"#;

const COLLECT_MULTI_SELECTS: &str = r#"async (S, A) => {
    const out = [];
    const triggers = Array.from(document.querySelectorAll(S.multi_trigger));
    for (let position = 0; position < triggers.length; position++) {
        const trigger = triggers[position];
        if (!isShown(trigger)) continue;
        const label = norm((trigger.querySelector('span') || trigger).textContent);
        const wrapper = trigger.closest(S.multi_wrapper) || trigger.parentElement;
        const body = () => wrapper.querySelector(S.dropdown_body);
        trigger.scrollIntoView({ block: 'center' });
        trigger.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));
        trigger.click();
        if (!(await waitUntil(() => isShown(body()), 1500))) {
            trigger.click();
            await sleep(200);
        }
        const levels = wrapper.querySelectorAll(S.cascader_level);
        const scope = levels[0] || wrapper.querySelector(S.select_container) || wrapper;
        const titled = Array.from(scope.querySelectorAll('li[title]'));
        const texts = (titled.length
            ? titled.map((li) => norm(li.getAttribute('title')))
            : Array.from(scope.querySelectorAll('li')).map((li) => norm(li.textContent)))
            .filter((text) => text);
        if (label && texts.length) {
            out.push({
                category: panelTitle(trigger, S) || 'Other',
                label,
                kind: 'multi_select',
                choices: texts.map((text, idx) => ({ text, choice_index: idx })),
                position,
                cascading: levels.length > 0,
            });
        }
        document.body.click();
        await sleep(100);
        if (isShown(body())) trigger.click();
        await sleep(50);
        if (isShown(body())) body().style.display = 'none';
    }
    return out;
}"#;

const APPLY_MULTI_SELECT: &str = r#"async (S, A) => {
    const trigger = findTrigger(S.multi_trigger, A.label, A.position);
    if (!trigger) return null;
    const wrapper = trigger.closest(S.multi_wrapper) || trigger.parentElement;
    const body = () => wrapper.querySelector(S.dropdown_body);
    trigger.scrollIntoView({ block: 'center' });
    trigger.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));
    trigger.click();
    if (!(await waitUntil(() => isShown(body()), 2000))) trigger.click();
    const scope = (A.cascading ? wrapper.querySelector(S.cascader_level) : null)
        || wrapper.querySelector(S.select_container) || wrapper;
    const applied = [];
    const missing = [];
    for (const option of A.options) {
        const items = Array.from(scope.querySelectorAll('li'));
        const item = items.find((li) => norm(li.getAttribute('title')) === option)
            || items.find((li) => norm(li.textContent).includes(option));
        if (!item) { missing.push(option); continue; }
        const box = item.querySelector(S.checkbox_input);
        if (box) {
            if (!box.checked) box.click();
        } else {
            item.click();
        }
        applied.push(option);
        await sleep(50);
    }
    await sleep(100);
    trigger.click();
    await sleep(300);
    let forceClosed = false;
    if (isShown(body())) {
        body().style.display = 'none';
        forceClosed = true;
    }
    return { applied, missing, force_closed: forceClosed };
}"#;

const COLLECT_DROPDOWNS: &str = r#"async (S, A) => {
    const out = [];
    const root = document.querySelector(S.filter_container) || document;
    const triggers = Array.from(root.querySelectorAll(S.dropdown_trigger));
    for (let position = 0; position < triggers.length; position++) {
        const trigger = triggers[position];
        const own = trigger.querySelector('span');
        const label = own ? norm(own.textContent) : '';
        if (!label) continue;
        let category = panelTitle(trigger, S);
        if (!category) {
            const item = trigger.closest(S.checkbox_item);
            const title = item ? item.querySelector('.element-title') : null;
            category = title ? norm(title.textContent) : 'Other';
        }
        trigger.click();
        await sleep(300);
        const menu = trigger.parentElement || trigger;
        const choices = [];
        Array.from(menu.querySelectorAll(S.radio_group)).forEach((group, groupIndex) => {
            const heading = group.querySelector(S.radio_group_title);
            const groupTitle = heading ? norm(heading.textContent) : 'General';
            Array.from(group.querySelectorAll(S.radio_item)).forEach((item, choiceIndex) => {
                const text = norm(item.textContent);
                if (text) {
                    choices.push({
                        text,
                        group_index: groupIndex,
                        group_title: groupTitle,
                        choice_index: choiceIndex,
                    });
                }
            });
        });
        let kind = 'dropdown_grouped';
        if (!choices.length) {
            kind = 'dropdown_flat';
            Array.from(menu.querySelectorAll('ul li'))
                .map((li) => norm(li.textContent))
                .filter((text) => text)
                .forEach((text, idx) => choices.push({ text, choice_index: idx }));
        }
        trigger.click();
        await sleep(100);
        if (choices.length) out.push({ category, label, kind, choices, position });
    }
    return out;
}"#;

const APPLY_FLAT_CHOICE: &str = r#"async (S, A) => {
    const trigger = findTrigger(S.dropdown_trigger, A.label, A.position);
    if (!trigger) return null;
    trigger.click();
    await sleep(300);
    const menu = trigger.parentElement || trigger;
    const needle = norm(A.choice);
    const items = Array.from(menu.querySelectorAll('ul li'));
    const item = items.find((li) => norm(li.textContent) === needle)
        || items.find((li) => { const text = norm(li.textContent); return text && text.includes(needle); });
    let clicked = false;
    if (item) {
        (item.querySelector('a, button, label, span') || item).click();
        clicked = true;
    }
    await sleep(200);
    if (isShown(menu.querySelector(S.dropdown_body))) trigger.click();
    return clicked;
}"#;

const APPLY_GROUPED_CHOICES: &str = r#"async (S, A) => {
    const trigger = findTrigger(S.dropdown_trigger, A.label, A.position);
    if (!trigger) return null;
    trigger.click();
    await sleep(300);
    const menu = trigger.parentElement || trigger;
    const groups = menu.querySelectorAll(S.radio_group);
    let clicked = 0;
    for (const [groupIndex, choiceIndex] of A.pairs) {
        const group = groups[groupIndex];
        const item = group ? group.querySelectorAll(S.radio_item)[choiceIndex] : null;
        if (!item) continue;
        (item.querySelector(S.radio_input) || item).click();
        clicked += 1;
        await sleep(50);
    }
    await sleep(200);
    if (isShown(menu.querySelector(S.dropdown_body))) trigger.click();
    return clicked;
}"#;

const OPEN_TAXONOMY: &str = r#"async (S, A) => {
    const section = sectionByTitle(S, S.taxonomy_title_text);
    const trigger = section ? section.querySelector(S.taxonomy_trigger) : null;
    if (!trigger || !isShown(trigger)) return false;
    trigger.click();
    return true;
}"#;

const EXPAND_TAXONOMY: &str = r#"async (S, A) => {
    const modal = document.querySelector(S.taxonomy_modal);
    const tree = modal ? modal.querySelector(S.tree_root) : null;
    if (!tree) return 0;
    let expanded = 0;
    let progressed = true;
    for (let pass = 0; progressed && pass < 100; pass++) {
        progressed = false;
        for (const node of tree.querySelectorAll(S.tree_node)) {
            if (!treeNodeShown(node)) continue;
            const switcher = node.querySelector(S.tree_switcher_closed);
            if (!switcher) continue;
            switcher.click();
            expanded += 1;
            progressed = true;
            await sleep(20);
        }
        if (progressed) await sleep(100);
    }
    return expanded;
}"#;

const COLLECT_TAXONOMY: &str = r#"async (S, A) => {
    const modal = document.querySelector(S.taxonomy_modal);
    const tree = modal ? modal.querySelector(S.tree_root) : null;
    if (!tree) return [];
    const out = [];
    for (const node of tree.querySelectorAll(S.tree_node)) {
        if (!treeNodeShown(node)) continue;
        const label = treeLabel(node, S);
        if (!label) continue;
        let depth = 0;
        let root = node;
        for (let cur = node.parentElement; cur && !cur.matches(S.tree_root); cur = cur.parentElement) {
            if (cur.matches(S.tree_node)) { depth += 1; root = cur; }
        }
        const switcher = node.querySelector(S.tree_switcher);
        const cls = switcher ? String(switcher.className || '') : '';
        out.push({
            label,
            depth,
            top_level: treeLabel(root, S) || label,
            expandable: (cls.includes('open') || cls.includes('close')) && !cls.includes('noop'),
            selectable: !!node.querySelector(S.tree_checkbox),
            selected: !!node.querySelector(S.tree_checked),
        });
    }
    return out;
}"#;

const CHECK_TAXONOMY: &str = r#"async (S, A) => {
    const modal = document.querySelector(S.taxonomy_modal);
    const tree = modal ? modal.querySelector(S.tree_root) : null;
    if (!tree) return [];
    const wanted = new Set(A.labels);
    const done = [];
    for (const node of tree.querySelectorAll(S.tree_node)) {
        if (!treeNodeShown(node)) continue;
        const label = treeLabel(node, S);
        if (!wanted.has(label) || done.includes(label)) continue;
        const box = node.querySelector(S.tree_checkbox);
        if (!box) continue;
        if (!node.querySelector(S.tree_checked)) {
            box.click();
            await sleep(20);
        }
        done.push(label);
    }
    return done;
}"#;

const CONFIRM: &str = r#"async (S, A) => {
    const button = Array.from(document.querySelectorAll(`${S.taxonomy_modal} ${S.confirm_button}`))
        .find((el) => isShown(el) && norm(el.textContent).includes(S.confirm_text));
    if (button) { button.click(); return 'confirmed'; }
    const modal = document.querySelector(S.taxonomy_modal);
    const close = modal ? modal.querySelector(S.modal_close) : null;
    if (close && isShown(close)) { close.click(); return 'closed'; }
    return 'missing';
}"#;

/// Wraps an `async (S, A) => ...` script into a self-invoking expression.
fn invoke(script: &str, selectors_json: &str, args: &Value) -> String {
    format!("(async () => {{\n{PRELUDE}\nreturn await ({script})({selectors_json}, {args});\n}})()")
}

pub struct AdvancedSearchForm<D: BrowserDriver> {
    driver: D,
    selectors: FormSelectors,
    selectors_json: String,
    timings: FormTimings,
}

impl<D: BrowserDriver> AdvancedSearchForm<D> {
    pub fn new(driver: D, selectors: FormSelectors) -> Self {
        let selectors_json = serde_json::to_string(&selectors).unwrap_or_else(|_| "{}".into());
        Self {
            driver,
            selectors,
            selectors_json,
            timings: FormTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: FormTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    async fn run(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        self.driver
            .evaluate(&invoke(script, &self.selectors_json, &args))
            .await
    }

    async fn run_as<T: DeserializeOwned>(&self, script: &str, args: Value) -> Result<T, DriverError> {
        let value = self.run(script, args).await?;
        serde_json::from_value(value).map_err(|err| DriverError::script(err.to_string()))
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}

fn menu_args(menu: &FilterElement, extra: Value) -> Value {
    let mut args = json!({ "label": menu.label, "position": menu.position });
    if let (Some(target), Value::Object(more)) = (args.as_object_mut(), extra) {
        target.extend(more);
    }
    args
}

#[derive(Debug, Deserialize)]
struct MultiSelectResult {
    #[serde(default)]
    applied: Vec<String>,
    #[serde(default)]
    missing: Vec<String>,
    #[serde(default)]
    force_closed: bool,
}

#[async_trait]
impl<D: BrowserDriver + 'static> ScreeningForm for AdvancedSearchForm<D> {
    async fn open(&mut self) -> Result<(), DriverError> {
        info!(target: "driver", url = %self.selectors.target_url, "opening advanced search");
        self.driver.navigate(&self.selectors.target_url).await?;
        self.driver
            .pause(Self::ms(self.timings.popup_settle_ms))
            .await;
        self.dismiss_login_popup().await?;
        self.driver
            .wait_for(
                &self.selectors.filter_container,
                WaitState::Visible,
                Self::ms(self.timings.open_timeout_ms),
            )
            .await
    }

    async fn dismiss_login_popup(&mut self) -> Result<bool, DriverError> {
        if !self.driver.is_visible(&self.selectors.login_close).await? {
            return Ok(false);
        }
        self.driver.click(&self.selectors.login_close).await?;
        self.driver
            .pause(Self::ms(self.timings.popup_settle_ms))
            .await;
        Ok(true)
    }

    async fn keyword_input_present(&mut self) -> Result<bool, DriverError> {
        Ok(self.driver.count(&self.selectors.keyword_input).await? > 0)
    }

    async fn fill_keywords(&mut self, text: &str) -> Result<(), DriverError> {
        self.driver.fill(&self.selectors.keyword_input, text).await
    }

    async fn search_region(&mut self, region: &str) -> Result<RegionOutcome, DriverError> {
        let tagged: bool = self.run_as(TAG_REGION_INPUT, json!({})).await?;
        if !tagged {
            return Err(DriverError::not_found(&self.selectors.region_search_input));
        }
        self.driver.click(REGION_INPUT_TAG).await?;
        self.driver.fill(REGION_INPUT_TAG, "").await?;
        self.driver
            .type_text(
                REGION_INPUT_TAG,
                region,
                Self::ms(self.timings.region_key_delay_ms),
            )
            .await?;
        self.driver
            .pause(Self::ms(self.timings.suggestion_wait_ms))
            .await;
        let outcome: String = self.run_as(PICK_REGION, json!({ "region": region })).await?;
        Ok(match outcome.as_str() {
            "checked" => RegionOutcome::Checked,
            "already" => RegionOutcome::AlreadyChecked,
            _ => RegionOutcome::NotFound,
        })
    }

    async fn close_region_picker(&mut self) -> Result<(), DriverError> {
        self.run(CLOSE_REGION, json!({})).await.map(|_| ())
    }

    async fn collect_checkboxes(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.run_as(COLLECT_CHECKBOXES, json!({})).await
    }

    async fn check_checkbox(
        &mut self,
        category: &str,
        label: &str,
    ) -> Result<CheckOutcome, DriverError> {
        let outcome: String = self
            .run_as(CHECK_CHECKBOX, json!({ "category": category, "label": label }))
            .await?;
        Ok(match outcome.as_str() {
            "checked" => CheckOutcome::Checked,
            "already" => CheckOutcome::AlreadyChecked,
            _ => CheckOutcome::NotFound,
        })
    }

    async fn collect_multi_selects(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.run_as(COLLECT_MULTI_SELECTS, json!({})).await
    }

    async fn apply_multi_select(
        &mut self,
        menu: &FilterElement,
        options: &[String],
    ) -> Result<MultiSelectOutcome, DriverError> {
        let args = menu_args(
            menu,
            json!({ "options": options, "cascading": menu.cascading }),
        );
        let result: Option<MultiSelectResult> = self.run_as(APPLY_MULTI_SELECT, args).await?;
        let result = result.ok_or_else(|| DriverError::not_found(&self.selectors.multi_trigger))?;
        Ok(MultiSelectOutcome {
            applied: result.applied,
            missing: result.missing,
            force_closed: result.force_closed,
        })
    }

    async fn collect_dropdowns(&mut self) -> Result<Vec<FilterElement>, DriverError> {
        self.run_as(COLLECT_DROPDOWNS, json!({})).await
    }

    async fn apply_flat_choice(
        &mut self,
        menu: &FilterElement,
        choice: &str,
    ) -> Result<bool, DriverError> {
        let clicked: Option<bool> = self
            .run_as(APPLY_FLAT_CHOICE, menu_args(menu, json!({ "choice": choice })))
            .await?;
        clicked.ok_or_else(|| DriverError::not_found(&self.selectors.dropdown_trigger))
    }

    async fn apply_grouped_choices(
        &mut self,
        menu: &FilterElement,
        pairs: &[(usize, usize)],
    ) -> Result<usize, DriverError> {
        let clicked: Option<usize> = self
            .run_as(APPLY_GROUPED_CHOICES, menu_args(menu, json!({ "pairs": pairs })))
            .await?;
        clicked.ok_or_else(|| DriverError::not_found(&self.selectors.dropdown_trigger))
    }

    async fn open_taxonomy(&mut self) -> Result<bool, DriverError> {
        let clicked: bool = self.run_as(OPEN_TAXONOMY, json!({})).await?;
        if !clicked {
            return Ok(false);
        }
        match self
            .driver
            .wait_for(
                &self.selectors.taxonomy_modal,
                WaitState::Visible,
                Self::ms(self.timings.modal_timeout_ms),
            )
            .await
        {
            Ok(()) => {}
            Err(DriverError::Timeout(what)) => {
                debug!(target: "driver", %what, "industry modal did not appear");
                return Ok(false);
            }
            Err(err) => return Err(err),
        }
        self.driver
            .pause(Self::ms(self.timings.modal_settle_ms))
            .await;
        Ok(true)
    }

    async fn expand_taxonomy_batch(&mut self) -> Result<usize, DriverError> {
        self.run_as(EXPAND_TAXONOMY, json!({})).await
    }

    async fn collect_taxonomy(&mut self) -> Result<Vec<TaxonomyNode>, DriverError> {
        self.run_as(COLLECT_TAXONOMY, json!({})).await
    }

    async fn check_taxonomy_nodes(
        &mut self,
        labels: &[String],
    ) -> Result<Vec<String>, DriverError> {
        self.run_as(CHECK_TAXONOMY, json!({ "labels": labels })).await
    }

    async fn confirm(&mut self) -> Result<ConfirmOutcome, DriverError> {
        let outcome: String = self.run_as(CONFIRM, json!({})).await?;
        let (outcome, settle) = match outcome.as_str() {
            "confirmed" => (ConfirmOutcome::Confirmed, self.timings.modal_settle_ms),
            "closed" => (ConfirmOutcome::Closed, self.timings.modal_settle_ms / 2),
            _ => (ConfirmOutcome::Missing, 0),
        };
        self.driver.pause(Self::ms(settle)).await;
        Ok(outcome)
    }

    async fn screenshot(&mut self, full_page: bool) -> Result<Vec<u8>, DriverError> {
        self.driver.screenshot(full_page).await
    }

    async fn pause(&mut self, duration: Duration) {
        self.driver.pause(duration).await;
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.driver.close().await
    }
}

/// Launches a Chromium instance per pipeline run.
pub struct ChromiumFormFactory {
    driver: DriverConfig,
    selectors: FormSelectors,
    timings: FormTimings,
}

impl ChromiumFormFactory {
    pub fn new(driver: DriverConfig, selectors: FormSelectors) -> Self {
        Self {
            driver,
            selectors,
            timings: FormTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: FormTimings) -> Self {
        self.timings = timings;
        self
    }
}

#[async_trait]
impl FormFactory for ChromiumFormFactory {
    async fn create(&self) -> Result<Box<dyn ScreeningForm>, PipelineError> {
        let driver = ChromiumDriver::launch(&self.driver).await?;
        let form = AdvancedSearchForm::new(driver, self.selectors.clone())
            .with_timings(self.timings.clone());
        Ok(Box::new(form))
    }
}
