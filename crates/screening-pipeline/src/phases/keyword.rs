use oracle_client::OracleReply;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::PhaseContext;
use crate::model::{rationale, reason_or_placeholder, ExecutionSummary, OneOrMany};
use crate::prompts;

const SEPARATORS: [char; 5] = [',', '，', '、', ';', '；'];

#[derive(Debug, Default, Deserialize)]
struct KeywordDecision {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    keywords: OneOrMany,
}

/// Splits oracle keyword output on ASCII and CJK separators, dropping
/// blanks and duplicates.
pub fn split_keywords(raw: OneOrMany) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for chunk in raw.into_vec() {
        for word in chunk.split(SEPARATORS.as_slice()) {
            let word = word.trim();
            if !word.is_empty() && !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }
    }
    keywords
}

pub async fn run(ctx: &mut PhaseContext<'_>, summary: &mut ExecutionSummary) {
    ctx.progress.notice("🔑 Phase 1: search keywords");

    match ctx.form.keyword_input_present().await {
        Ok(true) => {}
        Ok(false) => {
            ctx.progress.notice("  - Keyword input not found, skipping");
            return;
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, "keyword input lookup failed");
            ctx.progress.notice(format!("  - Keyword input unavailable: {err}"));
            return;
        }
    }

    ctx.progress.notice("  - Asking the oracle for keywords...");
    let decision = match ctx
        .oracle
        .decide::<KeywordDecision>(&prompts::keywords(ctx.guidance))
        .await
    {
        OracleReply::Decision(decision) => decision,
        OracleReply::Malformed(raw) => {
            debug!(target: "pipeline", raw_len = raw.len(), "malformed keyword decision");
            ctx.progress.notice("  - No usable keyword decision, skipping");
            return;
        }
    };

    summary.set_rationale(
        rationale::KEYWORDS,
        reason_or_placeholder(decision.reason.as_deref()),
    );
    let keywords = split_keywords(decision.keywords);
    if keywords.is_empty() {
        ctx.progress.notice("  - The oracle returned no keywords");
        return;
    }

    let text = keywords.join("、");
    match ctx.form.fill_keywords(&text).await {
        Ok(()) => {
            ctx.progress.notice(format!("  - Filled keywords: '{text}'"));
            summary.keywords = keywords;
            ctx.form.pause(Duration::from_millis(ctx.config.settle_pause_ms)).await;
        }
        Err(err) => {
            warn!(target: "pipeline", ?err, "keyword fill failed");
            ctx.progress.notice(format!("  - Could not fill keywords: {err}"));
        }
    }

    // The login popup tends to come back once the input is touched.
    if let Err(err) = ctx.form.dismiss_login_popup().await {
        debug!(target: "pipeline", ?err, "login popup dismissal failed");
    }
    ctx.capture("keywords filled").await;
}
