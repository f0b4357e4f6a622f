use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        oracle_client::metrics::register_metrics(registry);
        screening_pipeline::metrics::register_metrics(registry);
        agent_core::register_metrics(registry);
    });
}

/// Prometheus text exposition of every registered collector.
pub fn render() -> Option<(String, String)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&global_registry().gather(), &mut buffer) {
        error!(target: "server", ?err, "failed to encode prometheus metrics");
        return None;
    }
    match String::from_utf8(buffer) {
        Ok(body) => Some((encoder.format_type().to_string(), body)),
        Err(err) => {
            error!(target: "server", ?err, "prometheus output is not valid UTF-8");
            None
        }
    }
}
