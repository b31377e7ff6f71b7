// observability/metrics.rs - Prometheus Metrics

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::encoding::CodecError;

/// Configuration for metrics
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Histogram buckets for encoded message sizes (in bytes)
    pub size_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            size_buckets: vec![
                16.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0, 4096.0, 16384.0, 65536.0,
            ],
        }
    }
}

/// Handle to the Prometheus recorder
#[derive(Clone)]
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Codec metrics
pub struct CodecMetrics;

impl CodecMetrics {
    pub const ENCODED_TOTAL: &'static str = "fipa_acl_messages_encoded_total";
    pub const DECODED_TOTAL: &'static str = "fipa_acl_messages_decoded_total";
    pub const ERRORS_TOTAL: &'static str = "fipa_acl_codec_errors_total";
    pub const ENCODED_BYTES: &'static str = "fipa_acl_encoded_message_bytes";
    pub const DROPPED_TOTAL: &'static str = "fipa_acl_transport_dropped_total";
}

/// Interaction protocol metrics
pub struct ProtocolMetrics;

impl ProtocolMetrics {
    pub const ERRORS_TOTAL: &'static str = "fipa_acl_protocol_errors_total";
    pub const TIMEOUTS_TOTAL: &'static str = "fipa_acl_protocol_timeouts_total";
    pub const FINISHED_TOTAL: &'static str = "fipa_acl_conversations_finished_total";
}

/// Install the Prometheus recorder as the global metrics sink.
///
/// No HTTP endpoint is started; callers render the returned handle
/// wherever they expose metrics. Fails if a recorder is already installed.
pub fn init_metrics(config: MetricsConfig) -> Result<MetricsHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(CodecMetrics::ENCODED_BYTES.into()),
            &config.size_buckets,
        )?
        .install_recorder()?;

    describe_counter!(CodecMetrics::ENCODED_TOTAL, "Total number of ACL messages encoded");
    describe_counter!(CodecMetrics::DECODED_TOTAL, "Total number of ACL messages decoded");
    describe_counter!(CodecMetrics::ERRORS_TOTAL, "Total number of codec failures");
    describe_histogram!(CodecMetrics::ENCODED_BYTES, "Encoded ACL message size in bytes");
    describe_counter!(
        CodecMetrics::DROPPED_TOTAL,
        "Transport messages dropped because they failed to decode"
    );

    describe_counter!(
        ProtocolMetrics::ERRORS_TOTAL,
        "Total number of recorded interaction protocol errors"
    );
    describe_counter!(
        ProtocolMetrics::TIMEOUTS_TOTAL,
        "Total number of interaction protocol timeouts"
    );
    describe_counter!(
        ProtocolMetrics::FINISHED_TOTAL,
        "Total number of conversations reaching a terminal state"
    );

    tracing::info!("Metrics recorder installed");

    Ok(MetricsHandle { handle })
}

// Recording functions

/// Record a successfully encoded message
pub fn record_message_encoded(size: usize) {
    counter!(CodecMetrics::ENCODED_TOTAL).increment(1);
    histogram!(CodecMetrics::ENCODED_BYTES).record(size as f64);
}

/// Record a successfully decoded message
pub fn record_message_decoded() {
    counter!(CodecMetrics::DECODED_TOTAL).increment(1);
}

/// Record a codec failure
pub fn record_codec_error(error: &CodecError) {
    counter!(CodecMetrics::ERRORS_TOTAL, "kind" => error.kind()).increment(1);
}

/// Record a transport message that could not be delivered
pub fn record_transport_dropped(recipient: &str) {
    counter!(CodecMetrics::DROPPED_TOTAL, "recipient" => recipient.to_string()).increment(1);
}

/// Record a protocol error appended to a conversation's log
pub fn record_protocol_error(protocol: &'static str, kind: &'static str) {
    counter!(
        ProtocolMetrics::ERRORS_TOTAL,
        "protocol" => protocol,
        "kind" => kind
    )
    .increment(1);
}

/// Record a poll that found the conversation timed out
pub fn record_protocol_timeout(protocol: &'static str) {
    counter!(ProtocolMetrics::TIMEOUTS_TOTAL, "protocol" => protocol).increment(1);
}

/// Record a conversation reaching a terminal state
pub fn record_conversation_finished(protocol: &'static str, state: &'static str) {
    counter!(
        ProtocolMetrics::FINISHED_TOTAL,
        "protocol" => protocol,
        "state" => state
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(!config.size_buckets.is_empty());
        assert!(config.size_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_metric_names() {
        assert!(CodecMetrics::ENCODED_TOTAL.starts_with("fipa_acl_"));
        assert!(ProtocolMetrics::ERRORS_TOTAL.starts_with("fipa_acl_"));
        assert!(ProtocolMetrics::FINISHED_TOTAL.ends_with("_total"));
    }

    #[test]
    fn test_recording_without_recorder_is_a_no_op() {
        record_message_encoded(12);
        record_message_decoded();
        record_codec_error(&CodecError::InvalidDate);
        record_protocol_timeout("fipa-query");
    }
}
