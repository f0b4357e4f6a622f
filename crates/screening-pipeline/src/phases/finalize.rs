use std::time::Duration;
use tracing::warn;

use super::PhaseContext;
use crate::form::ConfirmOutcome;
use crate::model::ExecutionSummary;
use crate::report;

/// Saves the form, pushes a full-page screenshot and the report, and
/// returns the report.
pub async fn run(ctx: &mut PhaseContext<'_>, summary: &ExecutionSummary) -> String {
    ctx.progress.notice("⚙️ Finishing: saving the selection");
    match ctx.form.confirm().await {
        Ok(ConfirmOutcome::Confirmed) => ctx.progress.notice("  - Clicked the confirm button"),
        Ok(ConfirmOutcome::Closed) => ctx
            .progress
            .notice("  - Confirm button missing, closed the dialog instead"),
        Ok(ConfirmOutcome::Missing) => {}
        Err(err) => {
            warn!(target: "pipeline", ?err, "confirm failed");
            ctx.progress.notice(format!("  - Could not confirm: {err}"));
        }
    }

    ctx.progress.notice("📸 Taking the final screenshot...");
    ctx.form
        .pause(Duration::from_millis(ctx.config.settle_pause_ms))
        .await;
    match ctx.form.screenshot(true).await {
        Ok(png) => ctx.progress.screenshot(&png),
        Err(err) => {
            warn!(target: "pipeline", ?err, "final screenshot failed");
            ctx.progress
                .notice(format!("  - Final screenshot failed: {err}"));
        }
    }

    let report = report::synthesize(summary);
    ctx.progress.final_report(report.clone());
    ctx.progress.notice("✅ Screening run complete");
    report
}
