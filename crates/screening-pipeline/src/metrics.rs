use once_cell::sync::OnceCell;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use tracing::error;

static CACHE_EVENTS: OnceCell<IntCounterVec> = OnceCell::new();
static PROGRESS_DROPPED: OnceCell<IntCounter> = OnceCell::new();
static PIPELINE_RUNS: OnceCell<IntCounterVec> = OnceCell::new();
static PIPELINE_DURATION: OnceCell<HistogramVec> = OnceCell::new();

/// Registers pipeline collectors with the process registry.
pub fn register_metrics(registry: &Registry) {
    if let Some(counter) = counter_vec(
        "screening_cache_events_total",
        "Collection cache lookups and writes by outcome",
        &["event"],
    ) {
        register(registry, &counter, "cache events");
        let _ = CACHE_EVENTS.set(counter);
    }

    match IntCounter::new(
        "screening_progress_dropped_total",
        "Progress messages dropped because the channel was full",
    ) {
        Ok(counter) => {
            register(registry, &counter, "dropped progress");
            let _ = PROGRESS_DROPPED.set(counter);
        }
        Err(err) => error!(?err, "failed to create dropped progress counter"),
    }

    if let Some(counter) = counter_vec(
        "screening_pipeline_runs_total",
        "Pipeline runs by outcome",
        &["outcome"],
    ) {
        register(registry, &counter, "pipeline runs");
        let _ = PIPELINE_RUNS.set(counter);
    }

    match HistogramVec::new(
        HistogramOpts::new(
            "screening_pipeline_duration_seconds",
            "Wall time of pipeline runs",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"],
    ) {
        Ok(histogram) => {
            register(registry, &histogram, "pipeline duration");
            let _ = PIPELINE_DURATION.set(histogram);
        }
        Err(err) => error!(?err, "failed to create pipeline duration histogram"),
    }
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    match IntCounterVec::new(Opts::new(name, help), labels) {
        Ok(counter) => Some(counter),
        Err(err) => {
            error!(?err, name, "failed to create counter");
            None
        }
    }
}

fn register<C>(registry: &Registry, collector: &C, what: &str)
where
    C: prometheus::core::Collector + Clone + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        error!(?err, what, "failed to register collector");
    }
}

pub(crate) fn record_cache_event(event: &str) {
    if let Some(counter) = CACHE_EVENTS.get() {
        counter.with_label_values(&[event]).inc();
    }
}

pub(crate) fn record_progress_dropped() {
    if let Some(counter) = PROGRESS_DROPPED.get() {
        counter.inc();
    }
}

pub(crate) fn record_pipeline_run(outcome: &str, seconds: f64) {
    if let Some(counter) = PIPELINE_RUNS.get() {
        counter.with_label_values(&[outcome]).inc();
    }
    if let Some(histogram) = PIPELINE_DURATION.get() {
        histogram.with_label_values(&[outcome]).observe(seconds);
    }
}
