use oracle_client::OracleReply;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::multi_select::menu_index;
use super::{cached_collection, Collection, PhaseContext};
use crate::model::{
    lenient_list, rationale, reason_or_placeholder, ExecutionSummary, FilterElement, FilterKind,
};
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct DropdownDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    normal_dropdown_selections: Vec<FlatSelection>,
    #[serde(default, deserialize_with = "lenient_list")]
    radio_dropdown_selections: Vec<GroupedSelection>,
}

#[derive(Debug, Default, Deserialize)]
struct FlatSelection {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    selection: Value,
}

#[derive(Debug, Default, Deserialize)]
struct GroupedSelection {
    #[serde(default)]
    id: Value,
    #[serde(default, deserialize_with = "lenient_list")]
    selections: Vec<GroupedChoice>,
}

/// Indices may arrive as numbers or numeric strings.
#[derive(Debug, Default, Deserialize)]
struct GroupedChoice {
    #[serde(default)]
    choice: Option<String>,
    #[serde(default)]
    group_index: Value,
    #[serde(default)]
    choice_index: Value,
}

fn flat_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.as_str(),
        Value::Array(items) => items.iter().find_map(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Choice text on the menu that contains (or is contained by) `wanted`.
/// Menu text keeps its original formatting while oracle text may be trimmed.
pub fn match_flat_choice<'m>(menu: &'m FilterElement, wanted: &str) -> Option<&'m str> {
    let wanted = wanted.trim();
    menu.choices
        .iter()
        .find(|choice| choice.text.trim() == wanted)
        .or_else(|| menu.choices.iter().find(|choice| choice.text.contains(wanted)))
        .or_else(|| {
            menu.choices
                .iter()
                .find(|choice| !choice.text.trim().is_empty() && wanted.contains(choice.text.trim()))
        })
        .map(|choice| choice.text.as_str())
}

/// Valid `(group, choice)` pairs for a grouped menu, with their texts.
/// Pairs not present on the menu are re-resolved by choice text or dropped.
fn resolve_grouped(menu: &FilterElement, wanted: &[GroupedChoice]) -> Vec<((usize, usize), String)> {
    let mut resolved: Vec<((usize, usize), String)> = Vec::new();
    for item in wanted {
        let by_index = match (menu_index(&item.group_index), menu_index(&item.choice_index)) {
            (Some(group), Some(index)) => menu
                .choices
                .iter()
                .find(|c| c.group_index == Some(group) && c.choice_index == index),
            _ => None,
        };
        let by_text = || {
            let text = item.choice.as_deref()?.trim();
            menu.choices
                .iter()
                .find(|c| c.group_index.is_some() && c.text.trim() == text)
        };
        let Some(choice) = by_index.or_else(by_text) else {
            continue;
        };
        let Some(group) = choice.group_index else {
            continue;
        };
        let pair = (group, choice.choice_index);
        if !resolved.iter().any(|(existing, _)| *existing == pair) {
            resolved.push((pair, choice.text.clone()));
        }
    }
    resolved
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("🔽 Phase 5: dropdown menus");

    let menus = cached_collection(ctx, Collection::Dropdowns).await;
    if menus.is_empty() {
        ctx.progress.notice("  - No dropdown menus available, skipping");
        return;
    }

    ctx.progress.notice("  - Asking the oracle which dropdown options apply...");
    let decision = match ctx
        .oracle
        .decide::<DropdownDecision>(&prompts::dropdowns(ctx.guidance, &menus))
        .await
    {
        OracleReply::Decision(decision) => decision,
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed dropdown decision");
            ctx.progress.notice("  - No usable dropdown decision, skipping");
            return;
        }
    };
    summary.set_rationale(
        rationale::DROPDOWNS,
        reason_or_placeholder(decision.reason.as_deref()),
    );

    let mut touched = false;
    for entry in &decision.normal_dropdown_selections {
        let Some(menu) = menu_index(&entry.id).and_then(|idx| menus.get(idx)) else {
            continue;
        };
        let Some(wanted) = flat_text(&entry.selection) else {
            continue;
        };
        touched = true;
        if menu.kind == FilterKind::DropdownGrouped {
            let choice = GroupedChoice {
                choice: Some(wanted),
                ..GroupedChoice::default()
            };
            apply_grouped(ctx, summary, menu, &[choice]).await;
            continue;
        }
        let text = match_flat_choice(menu, &wanted).unwrap_or(&wanted).to_string();
        match ctx.form.apply_flat_choice(menu, &text).await {
            Ok(true) => {
                ctx.progress
                    .notice(format!("  - ✅ [{}] selected '{text}'", menu.label));
                summary.record_menu(&menu.category, &menu.label, vec![text]);
            }
            Ok(false) => ctx
                .progress
                .notice(format!("  - ⚠️ [{}] option '{wanted}' not found", menu.label)),
            Err(err) => {
                warn!(target: "pipeline", ?err, menu = %menu.label, "dropdown apply failed");
                ctx.progress
                    .notice(format!("  - Could not operate menu '{}': {err}", menu.label));
            }
        }
    }

    for entry in &decision.radio_dropdown_selections {
        let Some(menu) = menu_index(&entry.id).and_then(|idx| menus.get(idx)) else {
            continue;
        };
        if entry.selections.is_empty() {
            continue;
        }
        touched = true;
        if menu.kind == FilterKind::DropdownGrouped {
            apply_grouped(ctx, summary, menu, &entry.selections).await;
            continue;
        }
        // A flat menu answered in grouped form: fall back to the choice text.
        let Some(wanted) = entry.selections.iter().find_map(|s| s.choice.clone()) else {
            continue;
        };
        if let Some(text) = match_flat_choice(menu, &wanted).map(str::to_string) {
            if matches!(ctx.form.apply_flat_choice(menu, &text).await, Ok(true)) {
                summary.record_menu(&menu.category, &menu.label, vec![text]);
            }
        }
    }

    if touched {
        ctx.capture("dropdown menus applied").await;
    }
}

async fn apply_grouped(
    ctx: &mut PhaseContext<'_>,
    summary: &mut ExecutionSummary,
    menu: &FilterElement,
    wanted: &[GroupedChoice],
) {
    let resolved = resolve_grouped(menu, wanted);
    if resolved.is_empty() {
        ctx.progress
            .notice(format!("  - ⚠️ [{}] no valid option pairs", menu.label));
        return;
    }
    let pairs: Vec<(usize, usize)> = resolved.iter().map(|(pair, _)| *pair).collect();
    match ctx.form.apply_grouped_choices(menu, &pairs).await {
        Ok(0) => ctx
            .progress
            .notice(format!("  - ⚠️ [{}] options could not be clicked", menu.label)),
        Ok(count) => {
            let texts: Vec<String> = resolved.into_iter().map(|(_, text)| text).collect();
            ctx.progress.notice(format!(
                "  - ✅ [{}] selected {count} option(s): {}",
                menu.label,
                texts.join(", ")
            ));
            summary.record_menu(&menu.category, &menu.label, texts);
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, menu = %menu.label, "grouped dropdown apply failed");
            ctx.progress
                .notice(format!("  - Could not operate menu '{}': {err}", menu.label));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Choice;
    use serde_json::json;

    fn grouped_menu() -> FilterElement {
        FilterElement::menu(
            FilterKind::DropdownGrouped,
            "经营信息",
            "企业规模",
            vec![
                Choice::grouped("大型", 0, "规模", 0),
                Choice::grouped("中型", 0, "规模", 1),
                Choice::grouped("上市", 1, "类型", 0),
            ],
            0,
        )
    }

    #[test]
    fn flat_match_prefers_exact_then_containment() {
        let menu = FilterElement::menu(
            FilterKind::DropdownFlat,
            "经营信息",
            "成立年限",
            vec![
                Choice::plain("1-3年 (含)", 0),
                Choice::plain("3年", 1),
            ],
            0,
        );
        assert_eq!(match_flat_choice(&menu, "3年"), Some("3年"));
        assert_eq!(match_flat_choice(&menu, "1-3年"), Some("1-3年 (含)"));
        assert_eq!(match_flat_choice(&menu, "10年以上"), None);
    }

    #[test]
    fn grouped_pairs_are_validated() {
        let menu = grouped_menu();
        let wanted = vec![
            GroupedChoice {
                choice: Some("中型".into()),
                group_index: json!(0),
                choice_index: json!(1),
            },
            GroupedChoice {
                choice: Some("上市".into()),
                group_index: json!(7),
                choice_index: json!(7),
            },
            GroupedChoice {
                choice: Some("不存在".into()),
                group_index: json!(9),
                choice_index: json!(0),
            },
            GroupedChoice {
                choice: None,
                group_index: json!(0),
                choice_index: json!(1),
            },
        ];
        let resolved = resolve_grouped(&menu, &wanted);
        assert_eq!(
            resolved,
            vec![((0, 1), "中型".to_string()), ((1, 0), "上市".to_string())]
        );
    }

    #[test]
    fn string_indices_resolve_like_numbers() {
        let decision: DropdownDecision = serde_json::from_str(
            r#"{"radio_dropdown_selections": [{"id": "0", "selections": [{"group_index": "1", "choice_index": "0"}]}]}"#,
        )
        .expect("string indices decode");
        let entry = &decision.radio_dropdown_selections[0];
        assert_eq!(menu_index(&entry.id), Some(0));
        assert_eq!(
            resolve_grouped(&grouped_menu(), &entry.selections),
            vec![((1, 0), "上市".to_string())]
        );
    }

    #[test]
    fn null_lists_and_bad_entries_keep_the_rest() {
        let decision: DropdownDecision = serde_json::from_str(
            r#"{
                "reason": "large suppliers",
                "normal_dropdown_selections": [{"id": 1, "selection": "3年"}, "garbage"],
                "radio_dropdown_selections": null
            }"#,
        )
        .expect("decodes despite null list");
        assert_eq!(decision.reason.as_deref(), Some("large suppliers"));
        assert_eq!(decision.normal_dropdown_selections.len(), 1);
        assert_eq!(flat_text(&decision.normal_dropdown_selections[0].selection).as_deref(), Some("3年"));
        assert!(decision.radio_dropdown_selections.is_empty());
    }
}
