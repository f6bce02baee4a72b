//! Prometheus metrics for topic lifecycle activity.
//!
//! All metrics follow the naming convention: `topic_chain_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TOPIC METRICS
    // =========================================================================

    /// Topics created with a SUCCESS receipt
    pub static ref TOPICS_CREATED: Counter = Counter::new(
        "topic_chain_topics_created_total",
        "Total number of topics created"
    ).expect("metric creation failed");

    /// Topics deleted with a SUCCESS receipt
    pub static ref TOPICS_DELETED: Counter = Counter::new(
        "topic_chain_topics_deleted_total",
        "Total number of topics deleted"
    ).expect("metric creation failed");

    // =========================================================================
    // MESSAGE METRICS
    // =========================================================================

    /// Messages published (a chunked message counts once)
    pub static ref MESSAGES_SUBMITTED: Counter = Counter::new(
        "topic_chain_messages_submitted_total",
        "Total messages published to topics"
    ).expect("metric creation failed");

    /// Chunk transactions submitted
    pub static ref CHUNKS_SUBMITTED: Counter = Counter::new(
        "topic_chain_chunks_submitted_total",
        "Total message chunk transactions submitted"
    ).expect("metric creation failed");

    /// Messages handed to subscribers
    pub static ref MESSAGES_DELIVERED: Counter = Counter::new(
        "topic_chain_messages_delivered_total",
        "Total messages delivered to subscribers"
    ).expect("metric creation failed");

    /// Live subscriptions
    pub static ref ACTIVE_SUBSCRIPTIONS: Gauge = Gauge::new(
        "topic_chain_subscriptions_active",
        "Number of live topic subscriptions"
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSACTION METRICS
    // =========================================================================

    /// Transactions whose receipt carried a non-success status
    pub static ref TRANSACTIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("topic_chain_transactions_rejected_total", "Rejected transactions by status"),
        &["status"]
    ).expect("metric creation failed");

    /// Time from submission until a final receipt
    pub static ref RECEIPT_WAIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "topic_chain_receipt_wait_duration_seconds",
            "Time spent waiting for a final receipt"
        ).buckets(exponential_buckets(0.001, 2.0, 15).expect("valid bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Lifecycle errors by operation and kind
    pub static ref LIFECYCLE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("topic_chain_lifecycle_errors_total", "Errors by operation and type"),
        &["operation", "error_type"]
    ).expect("metric creation failed");
}

/// Keeps the registry alive for the lifetime of the application.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TOPICS_CREATED.clone()),
        Box::new(TOPICS_DELETED.clone()),
        Box::new(MESSAGES_SUBMITTED.clone()),
        Box::new(CHUNKS_SUBMITTED.clone()),
        Box::new(MESSAGES_DELIVERED.clone()),
        Box::new(ACTIVE_SUBSCRIPTIONS.clone()),
        Box::new(TRANSACTIONS_REJECTED.clone()),
        Box::new(RECEIPT_WAIT_DURATION.clone()),
        Box::new(LIFECYCLE_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
