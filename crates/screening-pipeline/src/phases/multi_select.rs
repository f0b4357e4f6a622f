use oracle_client::OracleReply;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::checkbox::string_list;
use super::{cached_collection, Collection, PhaseContext};
use crate::model::{lenient_list, ExecutionSummary};
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct MultiSelectDecision {
    #[serde(default, deserialize_with = "lenient_list")]
    decisions: Vec<MenuDecision>,
}

#[derive(Debug, Default, Deserialize)]
struct MenuDecision {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    selected_options: Value,
}

/// Menu index from a number or a numeric string.
pub(crate) fn menu_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("📑 Phase 4: multi-select menus");

    let menus = cached_collection(ctx, Collection::MultiSelects).await;
    if menus.is_empty() {
        ctx.progress.notice("  - No multi-select menus available, skipping");
        return;
    }

    ctx.progress.notice("  - Asking the oracle which menu options apply...");
    let decision = match ctx
        .oracle
        .decide::<MultiSelectDecision>(&prompts::multi_selects(ctx.guidance, &menus))
        .await
    {
        OracleReply::Decision(decision) => decision,
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed multi-select decision");
            ctx.progress.notice("  - No usable multi-select decision, skipping");
            return;
        }
    };
    ctx.progress.notice(format!(
        "  - The oracle returned {} menu decision(s)",
        decision.decisions.len()
    ));

    let mut touched = false;
    for entry in decision.decisions {
        let Some(menu) = menu_index(&entry.id).and_then(|idx| menus.get(idx)) else {
            debug!(target: "pipeline", id = %entry.id, "multi-select decision with invalid id");
            continue;
        };
        let options = string_list(&entry.selected_options);
        if options.is_empty() {
            continue;
        }

        ctx.progress
            .notice(format!("  - Menu [{}] {}...", menu.category, menu.label));
        touched = true;
        match ctx.form.apply_multi_select(menu, &options).await {
            Ok(outcome) => {
                for missing in &outcome.missing {
                    ctx.progress
                        .notice(format!("    - ⚠️ Option '{missing}' not found"));
                }
                if outcome.force_closed {
                    debug!(target: "pipeline", menu = %menu.label, "menu force-closed");
                }
                if !outcome.applied.is_empty() {
                    ctx.progress.notice(format!(
                        "    - ✅ Selected {}",
                        outcome.applied.join(", ")
                    ));
                    summary.record_menu(&menu.category, &menu.label, outcome.applied);
                }
            }
            Err(err) => {
                warn!(target: "pipeline", ?err, menu = %menu.label, "multi-select apply failed");
                ctx.progress
                    .notice(format!("    - Could not operate menu '{}': {err}", menu.label));
            }
        }
    }

    if touched {
        ctx.capture("multi-select menus applied").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn menu_index_is_lenient() {
        assert_eq!(menu_index(&json!(2)), Some(2));
        assert_eq!(menu_index(&json!(" 4 ")), Some(4));
        assert_eq!(menu_index(&json!(-1)), None);
        assert_eq!(menu_index(&Value::Null), None);
    }
}
