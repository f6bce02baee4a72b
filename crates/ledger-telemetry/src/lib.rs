//! # Ledger Telemetry
//!
//! Observability for the topic lifecycle client.
//!
//! ## Components
//!
//! - Structured logs through `tracing-subscriber` (pretty or JSON)
//! - Optional trace export over OTLP when an endpoint is configured
//! - Prometheus counters for topic, message and receipt activity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP collector; export is disabled when unset |
//! | `OTEL_SERVICE_NAME` | `topic-chain` | Service name in traces |
//! | `LEDGER_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `LEDGER_JSON_LOGS` | `false` | JSON formatted logs |
//! | `LEDGER_NETWORK` | `local` | Network profile recorded on traces |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, ACTIVE_SUBSCRIPTIONS, CHUNKS_SUBMITTED,
    LIFECYCLE_ERRORS, MESSAGES_DELIVERED, MESSAGES_SUBMITTED, RECEIPT_WAIT_DURATION,
    TOPICS_CREATED, TOPICS_DELETED, TRANSACTIONS_REJECTED,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Failed to initialize log subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, optional trace export and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, pending spans are flushed to the collector.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with operation context.
///
/// ```rust,ignore
/// let _span = ledger_telemetry::operation_span!("publish", topic = %topic_id).entered();
/// ```
#[macro_export]
macro_rules! operation_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
