use anyhow::{bail, Result};
use screening_pipeline::{progress_channel, render_readable, ProgressDrain, ProgressMessage, ScreeningTool};

use crate::app::AppContext;

pub async fn cmd_screen(app: &AppContext, guidance: String) -> Result<()> {
    let (progress, rx) = progress_channel(app.settings.controller.progress_capacity);
    let pipeline = app.pipeline.clone();
    let task = tokio::spawn(async move { ScreeningTool::run(pipeline.as_ref(), guidance, progress).await });
    let mut drain = ProgressDrain::new(rx, task);

    while let Some(message) = drain.next_message().await {
        match &message {
            ProgressMessage::Screenshot(data) => println!("[screenshot: {} base64 chars]", data.len()),
            ProgressMessage::FinalReport(_) => {}
            other => println!("{}", other.to_line()),
        }
    }
    let captured = drain.final_report().map(str::to_string);
    let returned = drain.finish().await?;
    let Some(report) = captured.or(returned) else {
        bail!("screening finished without a report");
    };

    println!();
    println!("===== Final report =====");
    println!("{}", render_readable(&report));
    Ok(())
}
