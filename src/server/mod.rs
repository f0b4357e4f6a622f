mod chat;
mod router;
mod state;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use chat::SESSION_HEADER;
pub use router::build_router;
pub use state::ServeState;

pub async fn serve(state: ServeState, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(target: "server", %addr, "screening agent listening");
    axum::serve(listener, build_router(state).into_make_service())
        .await
        .context("server exited with error")
}
