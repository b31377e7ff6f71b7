// observability/mod.rs - Tracing and Metrics

//! Observability module providing structured logging and Prometheus metrics.
//!
//! # Features
//!
//! - **Tracing**: Structured logging through `tracing-subscriber`
//! - **Metrics**: Codec and conversation counters on the `metrics` facade
//!
//! Recording functions are always safe to call. Until a recorder is
//! installed with [`init_metrics`] they do nothing.
//!
//! # Example
//!
//! ```no_run
//! use fipa_acl_engine::observability::{init_metrics, init_tracing, MetricsConfig, TracingConfig};
//!
//! init_tracing(TracingConfig::default()).unwrap();
//! let handle = init_metrics(MetricsConfig::default()).unwrap();
//! println!("{}", handle.render());
//! ```

mod metrics;
mod tracing_setup;

pub use metrics::{
    init_metrics, record_codec_error, record_conversation_finished, record_message_decoded,
    record_message_encoded, record_protocol_error, record_protocol_timeout,
    record_transport_dropped, CodecMetrics, MetricsConfig, MetricsHandle, ProtocolMetrics,
};

pub use tracing_setup::{init_tracing, TracingConfig, TracingFormat};
