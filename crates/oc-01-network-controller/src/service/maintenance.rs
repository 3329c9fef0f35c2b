use super::ControllerService;
use crate::domain::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// What one maintenance pass cleaned up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Idle rate-limit keys dropped
    pub rate_limit_purged: usize,
    /// Expired cache entries evicted
    pub cache_evicted: usize,
    /// Circuit tests past their lifetime
    pub circuit_tests_expired: usize,
    /// Unused per-network decision locks dropped
    pub locks_pruned: usize,
}

impl ControllerService {
    /// Run one maintenance pass.
    ///
    /// Call from a timer task (see [`ControllerService::spawn_maintenance`])
    /// to bound the memory held for idle requesters, networks and tests.
    pub fn run_maintenance(&self, now: Timestamp) -> MaintenanceReport {
        let rate_limit_purged = self
            .rate_limiter
            .purge(now, self.config.rate_limit_retention_ms);
        let cache_evicted = self.cache.evict_expired(now);
        let circuit_tests_expired = self
            .diagnostics
            .expire(now, self.config.circuit_test_ttl_ms);

        let before = self.network_locks.len();
        self.network_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        let locks_pruned = before.saturating_sub(self.network_locks.len());

        let report = MaintenanceReport {
            rate_limit_purged,
            cache_evicted,
            circuit_tests_expired,
            locks_pruned,
        };
        if report != MaintenanceReport::default() {
            debug!(?report, "[oc-01] Maintenance pass");
        }
        report
    }

    /// Run maintenance every `interval` until the service is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.run_maintenance(service.now());
            }
        })
    }
}
