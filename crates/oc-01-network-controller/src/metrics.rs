//! Metric recording, forwarded to `oc-telemetry` when the `metrics` feature
//! is enabled and compiled out otherwise.

#[cfg(feature = "metrics")]
pub(crate) use enabled::*;

#[cfg(not(feature = "metrics"))]
pub(crate) use disabled::*;

#[cfg(feature = "metrics")]
mod enabled {
    pub(crate) fn record_config_request(result: &str, elapsed_secs: f64) {
        oc_telemetry::metrics::record_config_request(result, elapsed_secs);
    }

    pub(crate) fn record_ip_assigned(mode: &str) {
        oc_telemetry::metrics::record_ip_assigned(mode);
    }

    pub(crate) fn record_cache_refresh(outcome: &str) {
        oc_telemetry::metrics::record_cache_refresh(outcome);
    }

    pub(crate) fn record_store_write_failure() {
        oc_telemetry::metrics::record_store_write_failure();
    }

    pub(crate) fn record_diagnostic_report(outcome: &str) {
        oc_telemetry::metrics::record_diagnostic_report(outcome);
    }
}

#[cfg(not(feature = "metrics"))]
mod disabled {
    pub(crate) fn record_config_request(_result: &str, _elapsed_secs: f64) {}

    pub(crate) fn record_ip_assigned(_mode: &str) {}

    pub(crate) fn record_cache_refresh(_outcome: &str) {}

    pub(crate) fn record_store_write_failure() {}

    pub(crate) fn record_diagnostic_report(_outcome: &str) {}
}
