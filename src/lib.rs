//! Screening agent: configuration, telemetry, the HTTP chat server and the
//! CLI around the workspace crates.

pub mod app;
pub mod cli;
pub mod config;
pub mod knowledge;
pub mod metrics;
pub mod server;
pub mod telemetry;

pub use app::AppContext;
pub use config::Settings;

pub mod build_info {
    pub const GIT_HASH: &str = env!("SCREENING_AGENT_GIT_HASH");
    pub const BUILD_DATE: &str = env!("SCREENING_AGENT_BUILD_DATE");
    pub const LONG_VERSION: &str = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("SCREENING_AGENT_GIT_HASH"),
        ", built ",
        env!("SCREENING_AGENT_BUILD_DATE"),
        ")"
    );
}
