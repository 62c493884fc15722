//! Prometheus metrics: request counters and latency histograms registered
//! through `prometheus_metric_storage::MetricStorage`.

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{Encoder, Registry, TextEncoder};

#[derive(prometheus_metric_storage::MetricStorage)]
#[metric(subsystem = "oracle_notary")]
struct Metrics {
    /// HTTP requests received, by route.
    #[metric(labels("route"))]
    requests_total: prometheus::IntCounterVec,

    /// `/notarize` end-to-end pipeline latency, in seconds.
    notarize_duration_seconds: prometheus::Histogram,

    /// Enclave quote generation latency, in seconds.
    enclave_quote_duration_seconds: prometheus::Histogram,

    /// Exchange price fetches that failed to parse or return usable data,
    /// by exchange.
    #[metric(labels("exchange"))]
    exchange_fetch_failures_total: prometheus::IntCounterVec,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static METRICS: OnceLock<Metrics> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn instance() -> &'static Metrics {
    METRICS.get_or_init(|| Metrics::instance(registry()).expect("metric registration"))
}

pub fn record_request(route: &str) {
    instance().requests_total.with_label_values(&[route]).inc();
}

pub fn observe_notarize_duration(duration: Duration) {
    instance().notarize_duration_seconds.observe(duration.as_secs_f64());
}

pub fn observe_enclave_quote_duration(duration: Duration) {
    instance()
        .enclave_quote_duration_seconds
        .observe(duration.as_secs_f64());
}

pub fn record_exchange_failure(exchange: &str) {
    instance()
        .exchange_fetch_failures_total
        .with_label_values(&[exchange])
        .inc();
}

/// Prometheus text exposition of every registered metric.
pub fn encode() -> String {
    let families = registry().gather();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
