//! Request Metrics
//!
//! Prometheus counters for the HTTP surface, rendered in the text
//! exposition format on `/metrics`.

use crate::error::{Error, Result};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Label used for requests that matched no registered type
pub const UNMATCHED_RESOURCE: &str = "static";

/// Metrics owned by one API instance
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    requests: IntCounterVec,
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new(
                "redfish_emulator_requests_total",
                "Requests handled, by resource type, method and status",
            ),
            &["resource", "method", "status"],
        )
        .map_err(|e| Error::Internal(format!("invalid metric definition: {e}")))?;

        registry
            .register(Box::new(requests.clone()))
            .map_err(|e| Error::Internal(format!("metric registration failed: {e}")))?;

        Ok(Self { registry, requests })
    }

    /// Count one handled request
    pub fn record(&self, resource: &str, method: &str, status: u16) {
        self.requests
            .with_label_values(&[resource, method, &status.to_string()])
            .inc();
    }

    /// Current count for one label set
    pub fn count(&self, resource: &str, method: &str, status: u16) -> u64 {
        self.requests
            .with_label_values(&[resource, method, &status.to_string()])
            .get()
    }

    /// Render every metric in the text exposition format
    pub fn render(&self) -> Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("metrics encoding failed: {e}")))?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_render() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.record("Volume", "POST", 200);
        metrics.record("Volume", "POST", 200);
        metrics.record("Volume", "DELETE", 404);

        assert_eq!(metrics.count("Volume", "POST", 200), 2);
        assert_eq!(metrics.count("Volume", "DELETE", 404), 1);

        let (content_type, body) = metrics.render().unwrap();
        assert!(content_type.starts_with("text/plain"));
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("redfish_emulator_requests_total"));
        assert!(text.contains(r#"resource="Volume""#));
    }
}
