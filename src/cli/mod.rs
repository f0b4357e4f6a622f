mod chat;
mod screen;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::app::AppContext;
use crate::config::load_settings;
use crate::server::{serve, ServeState};
use crate::{build_info, metrics, telemetry};

#[derive(Parser)]
#[command(author, version = build_info::LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP chat server
    Serve {
        /// Listen address, e.g. 0.0.0.0:8000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one screening directly and print its progress and report
    Screen {
        /// Target company profile
        #[arg(long)]
        guidance: String,
    },
    /// Send one chat message in-process and print the event stream
    Chat {
        #[arg(long)]
        message: String,
        #[arg(long)]
        session: Option<String>,
    },
}

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    settings.logging.json |= cli.log_json;
    let _log_guard = telemetry::init_logging(&settings.logging)?;
    metrics::register_metrics();

    info!(
        target: "app",
        version = env!("CARGO_PKG_VERSION"),
        git_hash = build_info::GIT_HASH,
        "starting screening agent"
    );

    let bind_override = match &cli.command {
        Commands::Serve { bind } => bind.clone(),
        _ => None,
    };
    let app = AppContext::from_settings(settings)?;

    let outcome = match cli.command {
        Commands::Serve { .. } => {
            let bind = bind_override.unwrap_or_else(|| app.settings.server.bind.clone());
            serve(ServeState::new(app.controller.clone()), &bind).await
        }
        Commands::Screen { guidance } => screen::cmd_screen(&app, guidance).await,
        Commands::Chat { message, session } => chat::cmd_chat(&app, message, session).await,
    };
    if let Err(err) = &outcome {
        error!(target: "app", "command failed: {err:#}");
    }
    outcome
}
