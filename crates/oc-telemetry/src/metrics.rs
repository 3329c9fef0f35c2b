//! Prometheus metrics for the network controller.
//!
//! All metrics follow the naming convention: `oc_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., config_requests_total)
//! - **Histogram**: Distribution of values (e.g., request_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DECISION ENGINE
    // =========================================================================

    /// Config requests by result code
    pub static ref CONFIG_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("oc_controller_config_requests_total", "Network config requests by result"),
        // ok, not_found, access_denied, rate_limited, temporarily_unavailable, internal_error
        &["result"]
    ).expect("metric creation failed");

    /// Config request latency
    pub static ref REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "oc_controller_request_duration_seconds",
            "Time spent answering a network config request"
        ).buckets(exponential_buckets(0.00005, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Addresses assigned automatically
    pub static ref IPS_ASSIGNED: CounterVec = CounterVec::new(
        Opts::new("oc_controller_ips_assigned_total", "Automatically assigned addresses"),
        &["mode"]  // v4_pool/v6_pool
    ).expect("metric creation failed");

    // =========================================================================
    // MEMBERSHIP CACHE
    // =========================================================================

    /// Cache refreshes from the persistent store
    pub static ref CACHE_REFRESHES: CounterVec = CounterVec::new(
        Opts::new("oc_controller_cache_refreshes_total", "Membership cache refreshes"),
        &["outcome"]  // installed/raced/stale_served/failed
    ).expect("metric creation failed");

    /// Failed write-through writes
    pub static ref STORE_WRITE_FAILURES: Counter = Counter::new(
        "oc_controller_store_write_failures_total",
        "Member writes that failed to reach the persistent store"
    ).expect("metric creation failed");

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Diagnostic reports by outcome
    pub static ref DIAGNOSTIC_REPORTS: CounterVec = CounterVec::new(
        Opts::new("oc_controller_diagnostic_reports_total", "Circuit test reports"),
        &["outcome"]  // accepted/dropped/unknown_test
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONFIG_REQUESTS.clone()),
        Box::new(REQUEST_DURATION.clone()),
        Box::new(IPS_ASSIGNED.clone()),
        Box::new(CACHE_REFRESHES.clone()),
        Box::new(STORE_WRITE_FAILURES.clone()),
        Box::new(DIAGNOSTIC_REPORTS.clone()),
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

/// Render all registered metrics in the Prometheus text format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record one answered config request.
pub fn record_config_request(result: &str, elapsed_secs: f64) {
    CONFIG_REQUESTS.with_label_values(&[result]).inc();
    REQUEST_DURATION.observe(elapsed_secs);
}

/// Record one automatically assigned address.
pub fn record_ip_assigned(mode: &str) {
    IPS_ASSIGNED.with_label_values(&[mode]).inc();
}

/// Record a cache refresh outcome.
pub fn record_cache_refresh(outcome: &str) {
    CACHE_REFRESHES.with_label_values(&[outcome]).inc();
}

/// Record a failed write-through.
pub fn record_store_write_failure() {
    STORE_WRITE_FAILURES.inc();
}

/// Record a diagnostic report outcome.
pub fn record_diagnostic_report(outcome: &str) {
    DIAGNOSTIC_REPORTS.with_label_values(&[outcome]).inc();
}
