//! Wires the workspace crates together from [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use agent_core::{KnowledgeBase, KnowledgeGateway, ReactController};
use anyhow::{Context, Result};
use oracle_client::{
    CredentialFile, GeminiBackend, OpenAiCompatibleBackend, OracleBackend, OracleClient,
};
use screening_pipeline::{CacheStore, ChromiumFormFactory, ScreeningPipeline};
use tracing::{info, warn};

use crate::config::{BackendKind, KnowledgeSettings, OracleSettings, Settings};
use crate::knowledge::{HttpKnowledgeBase, StaticKnowledgeBase};

pub struct AppContext {
    pub settings: Settings,
    pub pipeline: Arc<ScreeningPipeline>,
    pub controller: Arc<ReactController>,
}

impl AppContext {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let oracle = Arc::new(build_oracle(&settings.oracle)?);
        let pipeline = Arc::new(build_pipeline(&settings, Arc::clone(&oracle)));
        let knowledge = build_knowledge(&settings.knowledge)?;
        let controller = ReactController::new(oracle, knowledge, pipeline.clone())
            .with_config(settings.controller.clone());
        Ok(Self {
            settings,
            pipeline,
            controller: Arc::new(controller),
        })
    }
}

pub fn build_oracle(settings: &OracleSettings) -> Result<OracleClient> {
    let credentials = CredentialFile::load(&settings.credentials_file)
        .context("failed to load oracle credentials")?
        .with_env_overrides();
    let (backend, keys): (Arc<dyn OracleBackend>, Vec<String>) = match settings.backend {
        BackendKind::Gemini => (
            Arc::new(GeminiBackend::new(settings.gemini_config())?),
            credentials.gemini,
        ),
        BackendKind::OpenaiCompatible => (
            Arc::new(OpenAiCompatibleBackend::new(settings.openai_config())?),
            credentials.modelscope,
        ),
    };
    if keys.is_empty() {
        warn!(target: "app", backend = backend.name(), "no oracle credentials configured");
    }
    info!(target: "app", backend = backend.name(), keys = keys.len(), "oracle client ready");
    Ok(OracleClient::new(backend, keys).with_policy(settings.retry))
}

pub fn build_pipeline(settings: &Settings, oracle: Arc<OracleClient>) -> ScreeningPipeline {
    let forms = ChromiumFormFactory::new(settings.browser.clone(), settings.form.clone())
        .with_timings(settings.timings.clone());
    let cache = CacheStore::new(settings.cache.dir.clone()).with_enabled(settings.cache.enabled);
    ScreeningPipeline::new(Arc::new(forms), oracle, cache).with_config(settings.pipeline.clone())
}

pub fn build_knowledge(settings: &KnowledgeSettings) -> Result<KnowledgeGateway> {
    let base: Arc<dyn KnowledgeBase> = match settings.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            info!(target: "app", %endpoint, "using HTTP knowledge base");
            Arc::new(HttpKnowledgeBase::new(
                endpoint,
                Duration::from_secs(settings.timeout_secs),
            )?)
        }
        _ => {
            warn!(target: "app", "no knowledge base endpoint configured; queries will return no results");
            Arc::new(StaticKnowledgeBase::default())
        }
    };
    Ok(KnowledgeGateway::new(base).with_limits(settings.top_k, settings.min_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn wiring_logs_under_app_target() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_target(true)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            build_knowledge(&KnowledgeSettings::default()).unwrap();
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("app: no knowledge base endpoint configured"), "{output}");
    }
}
