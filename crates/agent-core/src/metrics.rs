use once_cell::sync::OnceCell;
use prometheus::{IntCounterVec, Opts, Registry};
use tracing::error;

static CONTROLLER_TURNS: OnceCell<IntCounterVec> = OnceCell::new();

/// Registers controller collectors with the process registry.
pub fn register_metrics(registry: &Registry) {
    match IntCounterVec::new(
        Opts::new(
            "screening_controller_turns_total",
            "Controller turns by decided action",
        ),
        &["action"],
    ) {
        Ok(counter) => {
            if let Err(err) = registry.register(Box::new(counter.clone())) {
                error!(?err, "failed to register controller turn counter");
            }
            let _ = CONTROLLER_TURNS.set(counter);
        }
        Err(err) => error!(?err, "failed to create controller turn counter"),
    }
}

pub(crate) fn record_turn(action: &str) {
    if let Some(counter) = CONTROLLER_TURNS.get() {
        counter.with_label_values(&[action]).inc();
    }
}
