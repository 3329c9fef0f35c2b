//! # Overlay-Controller Telemetry
//!
//! Logging and metrics for the network controller.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an `EnvFilter` and a
//!   pretty or JSON formatting layer
//! - **Metrics**: Prometheus counters and histograms for the decision engine,
//!   the membership cache and the diagnostics sink
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OC_SERVICE_NAME` | `overlay-controller` | Service name in logs |
//! | `OC_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `OC_CONSOLE_OUTPUT` | `true` | Emit logs to stderr |
//! | `OC_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::LoggingGuard;
pub use metrics::{gather_text, register_metrics, MetricsHandle};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A metric could not be registered.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register all metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so that early log lines can already be counted
    let metrics = register_metrics()?;
    let logging = logging::init_logging(config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
