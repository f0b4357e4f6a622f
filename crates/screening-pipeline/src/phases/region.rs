use oracle_client::OracleReply;
use serde::Deserialize;
use tracing::{debug, warn};

use super::PhaseContext;
use crate::form::RegionOutcome;
use crate::model::{rationale, reason_or_placeholder, ExecutionSummary, OneOrMany};
use crate::prompts;

#[derive(Debug, Default, Deserialize)]
struct RegionDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    regions: OneOrMany,
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("🌍 Phase 2: regions");
    ctx.progress.notice("  - Asking the oracle whether regions apply...");

    let decision = match ctx
        .oracle
        .decide::<RegionDecision>(&prompts::regions(ctx.guidance))
        .await
    {
        OracleReply::Decision(decision) => decision,
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed region decision");
            ctx.progress.notice("  - No usable region decision, skipping");
            return;
        }
    };

    summary.set_rationale(
        rationale::REGIONS,
        reason_or_placeholder(decision.reason.as_deref()),
    );
    let regions = decision.regions.into_vec();
    if regions.is_empty() {
        ctx.progress.notice("  - No region restriction needed");
        return;
    }
    ctx.progress
        .notice(format!("  - Regions chosen by the oracle: {}", regions.join(", ")));

    let mut selected = Vec::new();
    for region in regions {
        ctx.progress.notice(format!("  - Region [{region}]..."));
        match ctx.form.search_region(&region).await {
            Ok(RegionOutcome::Checked) => {
                ctx.progress.notice(format!("    - ✅ Checked '{region}'"));
                selected.push(region);
            }
            Ok(RegionOutcome::AlreadyChecked) => {
                ctx.progress.notice(format!("    - '{region}' was already checked"));
                selected.push(region);
            }
            Ok(RegionOutcome::NotFound) => {
                ctx.progress
                    .notice(format!("    - ⚠️ No suggestion matches '{region}'"));
            }
            Err(err) => {
                warn!(target: "pipeline", ?err, region = %region, "region search failed");
                ctx.progress
                    .notice(format!("    - Could not select '{region}': {err}"));
            }
        }
    }

    if let Err(err) = ctx.form.close_region_picker().await {
        debug!(target: "pipeline", ?err, "closing the region picker failed");
    }
    summary.regions = selected;
    ctx.capture("regions selected").await;
}
