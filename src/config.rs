//! Layered settings: built-in defaults, then an optional TOML file, then
//! `SCREENING_AGENT__*` environment variables (`__` separates sections,
//! e.g. `SCREENING_AGENT__SERVER__BIND=0.0.0.0:9000`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_core::ControllerConfig;
use anyhow::{Context, Result};
use browser_driver::DriverConfig;
use oracle_client::{GeminiConfig, OpenAiCompatibleConfig, RetryPolicy};
use screening_pipeline::{FormSelectors, FormTimings, PipelineConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "screening-agent.toml";
pub const ENV_PREFIX: &str = "SCREENING_AGENT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub oracle: OracleSettings,
    pub knowledge: KnowledgeSettings,
    pub cache: CacheSettings,
    pub browser: DriverConfig,
    pub form: FormSelectors,
    pub timings: FormTimings,
    pub pipeline: PipelineConfig,
    pub controller: ControllerConfig,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Gemini,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub backend: BackendKind,
    /// Gemini `generateContent` URL, or the API base of an OpenAI-compatible
    /// service. Empty means the backend's built-in default.
    pub endpoint: String,
    /// Model id for OpenAI-compatible backends.
    pub model: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    pub credentials_file: PathBuf,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Gemini,
            endpoint: String::new(),
            model: OpenAiCompatibleConfig::default().model,
            timeout_secs: 120,
            retry: RetryPolicy::default(),
            credentials_file: PathBuf::from("api_keys.json"),
        }
    }
}

impl OracleSettings {
    pub fn gemini_config(&self) -> GeminiConfig {
        let mut config = GeminiConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..GeminiConfig::default()
        };
        if !self.endpoint.trim().is_empty() {
            config.endpoint = self.endpoint.trim().to_string();
        }
        config
    }

    pub fn openai_config(&self) -> OpenAiCompatibleConfig {
        let mut config = OpenAiCompatibleConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..OpenAiCompatibleConfig::default()
        };
        if !self.endpoint.trim().is_empty() {
            config.api_base = self.endpoint.trim().trim_end_matches('/').to_string();
        }
        if !self.model.trim().is_empty() {
            config.model = self.model.trim().to_string();
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Retrieval service base URL. Without one the agent runs with an
    /// empty knowledge base.
    pub endpoint: Option<String>,
    pub top_k: usize,
    pub min_score: f32,
    pub timeout_secs: u64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            top_k: 3,
            min_score: 0.5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    /// Daily rolling log files are written here when set.
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

/// Resolves the settings file: the explicit path, else `screening-agent.toml`
/// in the working directory, else the user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("screening-agent").join("config.toml");
    user.exists().then_some(user)
}

/// Loads settings. An explicitly named file must exist.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let mut builder = config::Config::builder();
    match resolve_config_path(explicit) {
        Some(path) => {
            info!(target: "app", path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path.clone()).required(explicit.is_some()));
        }
        None => warn!(target: "app", "no configuration file found, using defaults"),
    }
    let built = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to assemble configuration")?;
    built
        .try_deserialize::<Settings>()
        .context("failed to parse configuration")
}
