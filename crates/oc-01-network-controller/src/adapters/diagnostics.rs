//! # Circuit Test Diagnostics
//!
//! Reports arrive on node-facing code paths that must never block, so the
//! sink is a bounded channel fed with `try_send`. A single collector task
//! drains it into the registered tests.

use crate::domain::{CircuitTest, CircuitTestReport, NetworkId, Timestamp};
use crate::metrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Create a connected sink/receiver pair.
pub fn diagnostics_channel(
    capacity: usize,
) -> (DiagnosticsSink, mpsc::Receiver<CircuitTestReport>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DiagnosticsSink { tx }, rx)
}

/// Non-blocking producer handle.
#[derive(Clone, Debug)]
pub struct DiagnosticsSink {
    tx: mpsc::Sender<CircuitTestReport>,
}

impl DiagnosticsSink {
    /// Queue a report. Returns `false` if it was dropped.
    pub fn submit(&self, report: CircuitTestReport) -> bool {
        match self.tx.try_send(report) {
            Ok(()) => {
                metrics::record_diagnostic_report("queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(report)) => {
                warn!(
                    test_id = report.test_id,
                    reporter = %report.reporter,
                    "[oc-01] Diagnostics channel full, dropping report"
                );
                metrics::record_diagnostic_report("dropped_full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_diagnostic_report("dropped_closed");
                false
            }
        }
    }
}

/// Registry of circuit tests and their reports.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticsCollector {
    tests: Arc<RwLock<HashMap<u64, CircuitTest>>>,
}

impl DiagnosticsCollector {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting reports for `test_id`. Re-registering resets it.
    pub fn register(&self, test_id: u64, network_id: NetworkId, now: Timestamp) {
        self.tests
            .write()
            .insert(test_id, CircuitTest::new(test_id, network_id, now));
    }

    /// Record a report. Reports for unregistered tests are dropped.
    pub fn ingest(&self, report: CircuitTestReport) -> bool {
        let mut tests = self.tests.write();
        match tests.get_mut(&report.test_id) {
            Some(test) => {
                test.reports.push(report);
                true
            }
            None => {
                debug!(
                    test_id = report.test_id,
                    "[oc-01] Report for unregistered circuit test"
                );
                false
            }
        }
    }

    /// Snapshot of a test.
    pub fn results(&self, test_id: u64) -> Option<CircuitTest> {
        self.tests.read().get(&test_id).cloned()
    }

    /// Stop tracking a test.
    pub fn remove(&self, test_id: u64) -> bool {
        self.tests.write().remove(&test_id).is_some()
    }

    /// Drop tests registered more than `ttl` ago. Returns how many.
    pub fn expire(&self, now: Timestamp, ttl: u64) -> usize {
        let mut tests = self.tests.write();
        let before = tests.len();
        tests.retain(|_, test| !test.is_expired(now, ttl));
        before - tests.len()
    }

    /// Number of registered tests.
    pub fn len(&self) -> usize {
        self.tests.read().len()
    }

    /// Whether no test is registered.
    pub fn is_empty(&self) -> bool {
        self.tests.read().is_empty()
    }

    /// Drain `receiver` into this collector until every sink is dropped.
    pub fn spawn(&self, mut receiver: mpsc::Receiver<CircuitTestReport>) -> JoinHandle<()> {
        let collector = self.clone();
        tokio::spawn(async move {
            while let Some(report) = receiver.recv().await {
                if collector.ingest(report) {
                    metrics::record_diagnostic_report("accepted");
                } else {
                    metrics::record_diagnostic_report("unregistered");
                }
            }
            debug!("[oc-01] Diagnostics channel closed");
        })
    }
}
