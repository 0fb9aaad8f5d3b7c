use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-wide counters for the relay, exported in Prometheus text format.
/// Plain atomics, updated from any worker without locking.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    stream_requests: AtomicU64,
    stream_errors: AtomicU64,
    stream_duration_micros: AtomicU64,
    isalive_requests: AtomicU64,
    published_messages: AtomicU64,
    publish_errors: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one stream publish request and how long it took.
    pub fn observe_stream(&self, success: bool, elapsed: Duration) {
        self.stream_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.stream_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.stream_duration_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record one liveness probe.
    pub fn observe_isalive(&self) {
        self.isalive_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broker-acknowledged message.
    pub fn record_publish_ok(&self) {
        self.published_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed publish attempt.
    pub fn record_publish_error(&self) {
        self.publish_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Export all counters in Prometheus text format.
    pub fn render(&self) -> String {
        let stream_requests = self.stream_requests.load(Ordering::Relaxed);
        let duration_seconds =
            self.stream_duration_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP stream_relay_http_requests_total HTTP requests handled, by path\n\
             # TYPE stream_relay_http_requests_total counter\n\
             stream_relay_http_requests_total{{path=\"/api/v1/streamdata\"}} {}\n\
             stream_relay_http_requests_total{{path=\"/api/v2/sys/info/isalive\"}} {}\n",
            stream_requests,
            self.isalive_requests.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stream_relay_http_request_errors_total Requests answered with an error status\n\
             # TYPE stream_relay_http_request_errors_total counter\n\
             stream_relay_http_request_errors_total{{path=\"/api/v1/streamdata\"}} {}\n",
            self.stream_errors.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stream_relay_http_duration_seconds Time spent handling stream publishes\n\
             # TYPE stream_relay_http_duration_seconds summary\n\
             stream_relay_http_duration_seconds_sum{{path=\"/api/v1/streamdata\"}} {:.6}\n\
             stream_relay_http_duration_seconds_count{{path=\"/api/v1/streamdata\"}} {}\n",
            duration_seconds, stream_requests
        ));

        output.push_str(&format!(
            "# HELP stream_relay_published_messages_total Messages acknowledged by the broker\n\
             # TYPE stream_relay_published_messages_total counter\n\
             stream_relay_published_messages_total {}\n",
            self.published_messages.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP stream_relay_publish_errors_total Publish attempts that failed\n\
             # TYPE stream_relay_publish_errors_total counter\n\
             stream_relay_publish_errors_total {}\n",
            self.publish_errors.load(Ordering::Relaxed)
        ));

        output
    }
}
