use once_cell::sync::OnceCell;
use prometheus::{IntCounterVec, Opts, Registry};
use tracing::error;

static ORACLE_ATTEMPTS: OnceCell<IntCounterVec> = OnceCell::new();

/// Registers oracle collectors with the process registry.
pub fn register_metrics(registry: &Registry) {
    let attempts = match IntCounterVec::new(
        Opts::new(
            "screening_oracle_attempts_total",
            "Oracle backend calls by backend and outcome",
        ),
        &["backend", "outcome"],
    ) {
        Ok(counter) => counter,
        Err(err) => {
            error!(?err, "failed to create oracle attempts counter");
            return;
        }
    };
    if let Err(err) = registry.register(Box::new(attempts.clone())) {
        error!(?err, "failed to register oracle attempts counter");
    }
    let _ = ORACLE_ATTEMPTS.set(attempts);
}

pub(crate) fn record_attempt(backend: &str, outcome: &str) {
    if let Some(counter) = ORACLE_ATTEMPTS.get() {
        counter.with_label_values(&[backend, outcome]).inc();
    }
}
