use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(
        "edgeroute_requests_total",
        "Total number of inbound requests by outcome"
    );
    describe_histogram!(
        "edgeroute_request_duration_seconds",
        "Inbound request duration in seconds"
    );
    describe_counter!(
        "edgeroute_config_loads_total",
        "Rule document loads by the source that satisfied them"
    );
    describe_counter!(
        "edgeroute_upstream_requests_total",
        "Requests sent to proxy upstreams"
    );
    describe_histogram!(
        "edgeroute_upstream_redirects_followed",
        "Redirect hops followed per proxied request"
    );
}

/// Start Prometheus metrics server on given address
pub fn start_metrics_server(addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: std::net::SocketAddr = addr.parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    init_metrics();

    Ok(())
}

pub struct Metrics;

impl Metrics {
    /// Record a finished inbound request
    #[inline]
    pub fn record_request(outcome: &'static str, status: u16, duration: Duration) {
        let labels = [("outcome", outcome.to_string()), ("status", status.to_string())];

        counter!("edgeroute_requests_total", &labels).increment(1);
        histogram!("edgeroute_request_duration_seconds", "outcome" => outcome)
            .record(duration.as_secs_f64());
    }

    #[inline]
    pub fn record_config_load(source: &'static str) {
        counter!("edgeroute_config_loads_total", "source" => source).increment(1);
    }

    /// Record one upstream fetch made while proxying
    #[inline]
    pub fn record_upstream_request(status: u16) {
        counter!("edgeroute_upstream_requests_total", "status" => status.to_string())
            .increment(1);
    }

    #[inline]
    pub fn record_redirects_followed(hops: u32) {
        histogram!("edgeroute_upstream_redirects_followed").record(f64::from(hops));
    }
}

/// Timer for request duration tracking
pub struct RequestTimer {
    start: std::time::Instant,
}

impl RequestTimer {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    pub fn finish(self, outcome: &'static str, status: u16) {
        Metrics::record_request(outcome, status, self.start.elapsed());
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}
