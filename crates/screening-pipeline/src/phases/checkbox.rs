use oracle_client::OracleReply;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{cached_collection, Collection, PhaseContext};
use crate::form::CheckOutcome;
use crate::model::{null_as_default, rationale, reason_or_placeholder, ExecutionSummary};
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct CheckboxDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    decision: BTreeMap<String, Value>,
}

/// Strings of a JSON value that should be a list of labels.
pub(crate) fn string_list(value: &Value) -> Vec<String> {
    let items = match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("☑️ Phase 3: checkbox filters");

    let catalog = cached_collection(ctx, Collection::Checkboxes).await;
    if catalog.is_empty() {
        ctx.progress.notice("  - No checkbox controls available, skipping");
        return;
    }

    ctx.progress.notice("  - Asking the oracle which checkboxes apply...");
    let decision = match ctx
        .oracle
        .decide::<CheckboxDecision>(&prompts::checkboxes(ctx.guidance, &catalog))
        .await
    {
        OracleReply::Decision(decision) => decision,
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed checkbox decision");
            ctx.progress.notice("  - No usable checkbox decision, skipping");
            return;
        }
    };
    summary.set_rationale(
        rationale::CHECKBOXES,
        reason_or_placeholder(decision.reason.as_deref()),
    );

    let mut wanted: Vec<(String, String)> = decision
        .decision
        .iter()
        .flat_map(|(category, labels)| {
            string_list(labels)
                .into_iter()
                .map(move |label| (category.trim().to_string(), label))
        })
        .collect();
    if wanted.is_empty() {
        ctx.progress.notice("  - The oracle selected no checkboxes");
        return;
    }

    let pause = Duration::from_millis(ctx.config.checkbox_pause_ms);
    let mut applied = 0usize;
    for element in &catalog {
        let Some(pos) = wanted
            .iter()
            .position(|(cat, label)| *cat == element.category && *label == element.label)
        else {
            continue;
        };
        wanted.remove(pos);
        match ctx.form.check_checkbox(&element.category, &element.label).await {
            Ok(outcome @ (CheckOutcome::Checked | CheckOutcome::AlreadyChecked)) => {
                if outcome == CheckOutcome::Checked {
                    applied += 1;
                }
                summary.record_checkbox(&element.category, &element.label);
            }
            Ok(CheckOutcome::NotFound) => {
                ctx.progress.notice(format!(
                    "  - ⚠️ Checkbox [{}] {} not found on the page",
                    element.category, element.label
                ));
            }
            Err(err) => {
                warn!(target: "pipeline", ?err, label = %element.label, "checkbox click failed");
                ctx.progress.notice(format!(
                    "  - Could not check [{}] {}: {err}",
                    element.category, element.label
                ));
            }
        }
        ctx.form.pause(pause).await;
    }

    for (category, label) in &wanted {
        ctx.progress.notice(format!(
            "  - ⚠️ The oracle chose [{category}] {label}, which is not on the form"
        ));
    }
    ctx.progress
        .notice(format!("  - Checked {applied} new checkbox(es)"));
    ctx.capture("checkboxes applied").await;
}
