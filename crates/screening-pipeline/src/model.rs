use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Rationale placeholder used when a decision carries no `reason`.
pub const NO_REASON: &str = "(no reason given)";

/// Rationale keys used by the phases and the report.
pub mod rationale {
    pub const KEYWORDS: &str = "keywords";
    pub const REGIONS: &str = "regions";
    pub const CHECKBOXES: &str = "checkboxes";
    pub const DROPDOWNS: &str = "dropdowns";
    pub const INDUSTRY_TOP_LEVEL: &str = "industry_top_level";
    pub const INDUSTRY_PREFIX: &str = "industry_";

    pub fn industry(category: &str) -> String {
        format!("{INDUSTRY_PREFIX}{category}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Checkbox,
    DropdownFlat,
    DropdownGrouped,
    MultiSelect,
    TextInput,
}

/// One selectable value of a control. Grouped dropdowns address values by
/// `(group_index, choice_index)`; other kinds only use `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    #[serde(default)]
    pub choice_index: usize,
}

impl Choice {
    pub fn plain(text: impl Into<String>, index: usize) -> Self {
        Self {
            text: text.into(),
            group_index: None,
            group_title: None,
            choice_index: index,
        }
    }

    pub fn grouped(
        text: impl Into<String>,
        group_index: usize,
        group_title: impl Into<String>,
        choice_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            group_index: Some(group_index),
            group_title: Some(group_title.into()),
            choice_index,
        }
    }
}

/// Descriptor of a page control as collected. Never mutated after
/// collection; apply steps re-locate the live control by label/position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterElement {
    pub category: String,
    pub label: String,
    pub kind: FilterKind,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub checked: bool,
    /// Index among controls of the same kind at collection time.
    #[serde(default)]
    pub position: usize,
    /// Multi-select menus rendered as a cascader.
    #[serde(default)]
    pub cascading: bool,
}

impl FilterElement {
    pub fn checkbox(category: impl Into<String>, label: impl Into<String>, checked: bool) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            kind: FilterKind::Checkbox,
            choices: Vec::new(),
            checked,
            position: 0,
            cascading: false,
        }
    }

    pub fn menu(
        kind: FilterKind,
        category: impl Into<String>,
        label: impl Into<String>,
        choices: Vec<Choice>,
        position: usize,
    ) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            kind,
            choices,
            checked: false,
            position,
            cascading: false,
        }
    }

    pub fn choice_texts(&self) -> Vec<&str> {
        self.choices.iter().map(|choice| choice.text.as_str()).collect()
    }
}

/// Entry of the industry tree, in depth-first document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub label: String,
    pub depth: usize,
    pub top_level: String,
    #[serde(default)]
    pub expandable: bool,
    #[serde(default)]
    pub selectable: bool,
    #[serde(default)]
    pub selected: bool,
}

/// Checkbox labels applied under one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionGroup {
    pub category: String,
    pub labels: Vec<String>,
}

/// Values applied on one dropdown/multi-select menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSelection {
    pub category: String,
    pub menu: String,
    pub values: Vec<String>,
}

/// Everything one pipeline run selected, plus the oracle's rationales.
/// Built fresh per run and handed to report synthesis once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub keywords: Vec<String>,
    pub regions: Vec<String>,
    pub checkboxes: Vec<SelectionGroup>,
    pub dropdowns: Vec<MenuSelection>,
    pub taxonomy: Vec<String>,
    pub rationales: Vec<(String, String)>,
}

impl ExecutionSummary {
    pub fn record_checkbox(&mut self, category: &str, label: &str) {
        match self.checkboxes.iter_mut().find(|g| g.category == category) {
            Some(group) => {
                if !group.labels.iter().any(|l| l == label) {
                    group.labels.push(label.to_string());
                }
            }
            None => self.checkboxes.push(SelectionGroup {
                category: category.to_string(),
                labels: vec![label.to_string()],
            }),
        }
    }

    /// Replaces the values recorded for `(category, menu)`.
    pub fn record_menu(&mut self, category: &str, menu: &str, values: Vec<String>) {
        match self
            .dropdowns
            .iter_mut()
            .find(|m| m.category == category && m.menu == menu)
        {
            Some(existing) => existing.values = values,
            None => self.dropdowns.push(MenuSelection {
                category: category.to_string(),
                menu: menu.to_string(),
                values,
            }),
        }
    }

    pub fn set_rationale(&mut self, key: &str, text: impl Into<String>) {
        let text = text.into();
        match self.rationales.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = text,
            None => self.rationales.push((key.to_string(), text)),
        }
    }

    /// Appends to an existing rationale with a space.
    pub fn append_rationale(&mut self, key: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.rationales.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => {
                if !existing.is_empty() {
                    existing.push(' ');
                }
                existing.push_str(text);
            }
            None => self.rationales.push((key.to_string(), text.to_string())),
        }
    }

    pub fn rationale(&self, key: &str) -> Option<&str> {
        self.rationales
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Reason text from an optional decision field, or the placeholder.
pub fn reason_or_placeholder(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NO_REASON.to_string(),
    }
}

/// Oracle fields that may arrive as a single string or as a list. Null and
/// other shapes decode as an empty list; numbers in a list become text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<'de> Deserialize<'de> for OneOrMany {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Self::One(text),
            Value::Array(items) => Self::Many(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        Value::Number(number) => Some(number.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::default(),
        })
    }
}

/// List field decoded entry by entry: null or a non-list is empty, and
/// entries that do not decode are dropped.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Null decodes as the default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl OneOrMany {
    /// Trimmed, non-empty entries.
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::One(text) => vec![text],
            Self::Many(items) => items,
        };
        raw.into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rationale_upsert_and_append() {
        let mut summary = ExecutionSummary::default();
        summary.set_rationale("keywords", "first");
        summary.set_rationale("keywords", "second");
        summary.append_rationale("industry_制造业", "batch one");
        summary.append_rationale("industry_制造业", " batch two ");
        assert_eq!(summary.rationale("keywords"), Some("second"));
        assert_eq!(
            summary.rationale("industry_制造业"),
            Some("batch one batch two")
        );
        assert_eq!(summary.rationales.len(), 2);
    }

    #[test]
    fn records_keep_first_seen_order() {
        let mut summary = ExecutionSummary::default();
        summary.record_checkbox("状态", "存续");
        summary.record_checkbox("资本", "1亿以上");
        summary.record_checkbox("状态", "在业");
        summary.record_checkbox("状态", "存续");
        assert_eq!(summary.checkboxes[0].labels, vec!["存续", "在业"]);
        assert_eq!(summary.checkboxes[1].category, "资本");
    }

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let one: OneOrMany = serde_json::from_str(r#"" 海鲜 ""#).expect("string");
        let many: OneOrMany = serde_json::from_str(r#"["a", "", "b"]"#).expect("list");
        assert_eq!(one.into_vec(), vec!["海鲜"]);
        assert_eq!(many.into_vec(), vec!["a", "b"]);
    }

    #[test]
    fn one_or_many_tolerates_null_and_mixed_lists() {
        let null: OneOrMany = serde_json::from_str("null").expect("null");
        let mixed: OneOrMany = serde_json::from_str(r#"["广东省", 3, null, {"x": 1}]"#).expect("mixed");
        assert!(null.into_vec().is_empty());
        assert_eq!(mixed.into_vec(), vec!["广东省", "3"]);
    }

    #[derive(Debug, Deserialize)]
    struct Listing {
        #[serde(default, deserialize_with = "lenient_list")]
        items: Vec<u32>,
        #[serde(default, deserialize_with = "null_as_default")]
        note: String,
    }

    #[test]
    fn lenient_fields_drop_bad_entries_only() {
        let listing: Listing =
            serde_json::from_str(r#"{"items": [1, "two", 3], "note": null}"#).expect("decodes");
        assert_eq!(listing.items, vec![1, 3]);
        assert_eq!(listing.note, "");
        let empty: Listing = serde_json::from_str(r#"{"items": null}"#).expect("null list");
        assert!(empty.items.is_empty());
    }

    #[test]
    fn placeholder_for_blank_reason() {
        assert_eq!(reason_or_placeholder(None), NO_REASON);
        assert_eq!(reason_or_placeholder(Some("  ")), NO_REASON);
        assert_eq!(reason_or_placeholder(Some("ok")), "ok");
    }
}
