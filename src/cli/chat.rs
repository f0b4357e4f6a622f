use anyhow::Result;
use futures::StreamExt;
use uuid::Uuid;

use crate::app::AppContext;

pub async fn cmd_chat(app: &AppContext, message: String, session: Option<String>) -> Result<()> {
    let session = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    eprintln!("session: {session}");
    let mut events = Box::pin(app.controller.clone().handle_message(session, message));
    while let Some(event) = events.next().await {
        print!("{}", event.to_wire());
    }
    Ok(())
}
