//! Metrics publishing for moderation decisions.

use async_trait::async_trait;
use cadence::{BufferedUdpMetricSink, Counted, CountedExt, Gauged, QueuingMetricSink, StatsdClient, Timed};
use std::net::UdpSocket;
use std::sync::Arc;
use tracing::error;

use crate::errors::MetricsError;

/// Counter, gauge, and timing publication with optional tags.
///
/// Kept minimal and cadence-shaped so statsd is a drop-in backend while
/// tests run against the no-op implementation.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    /// Increment a counter by 1.
    async fn incr(&self, key: &str);

    /// Increment a counter by 1 with tags.
    async fn incr_with_tags(&self, key: &str, tags: &[(&str, &str)]);

    /// Increment a counter by a specific value.
    async fn count(&self, key: &str, value: u64);

    /// Record a gauge value.
    async fn gauge(&self, key: &str, value: u64);

    /// Record a timing in milliseconds.
    async fn time(&self, key: &str, millis: u64);
}

/// No-op implementation for development and testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpMetricsPublisher;

impl NoOpMetricsPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsPublisher for NoOpMetricsPublisher {
    async fn incr(&self, _key: &str) {}
    async fn incr_with_tags(&self, _key: &str, _tags: &[(&str, &str)]) {}
    async fn count(&self, _key: &str, _value: u64) {}
    async fn gauge(&self, _key: &str, _value: u64) {}
    async fn time(&self, _key: &str, _millis: u64) {}
}

/// Statsd-backed implementation using a queuing UDP sink.
pub struct StatsdMetricsPublisher {
    client: Arc<StatsdClient>,
}

impl StatsdMetricsPublisher {
    /// Create a publisher sending to `host` (a `host:port` pair) with the
    /// given metric prefix.
    pub fn new(host: &str, prefix: &str) -> Result<Self, MetricsError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| MetricsError::ClientCreationFailed {
            details: format!("udp bind failed: {}", e),
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| MetricsError::ClientCreationFailed {
                details: format!("set_nonblocking failed: {}", e),
            })?;

        let udp_sink = BufferedUdpMetricSink::from(host, socket).map_err(|e| {
            MetricsError::ClientCreationFailed {
                details: format!("udp sink creation failed: {}", e),
            }
        })?;
        let sink = QueuingMetricSink::from(udp_sink);
        let client = StatsdClient::from_sink(prefix, sink);

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl MetricsPublisher for StatsdMetricsPublisher {
    async fn incr(&self, key: &str) {
        if let Err(e) = self.client.incr(key) {
            error!(error = ?e, key = %key, "Failed to publish counter");
        }
    }

    async fn incr_with_tags(&self, key: &str, tags: &[(&str, &str)]) {
        let mut builder = self.client.incr_with_tags(key);
        for (tag_key, tag_value) in tags {
            builder = builder.with_tag(tag_key, tag_value);
        }
        builder.send();
    }

    async fn count(&self, key: &str, value: u64) {
        if let Err(e) = self.client.count(key, value) {
            error!(error = ?e, key = %key, "Failed to publish count");
        }
    }

    async fn gauge(&self, key: &str, value: u64) {
        if let Err(e) = self.client.gauge(key, value) {
            error!(error = ?e, key = %key, "Failed to publish gauge");
        }
    }

    async fn time(&self, key: &str, millis: u64) {
        if let Err(e) = self.client.time(key, millis) {
            error!(error = ?e, key = %key, "Failed to publish timing");
        }
    }
}
