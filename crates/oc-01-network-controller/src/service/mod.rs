//! # Controller Service
//!
//! Implements `NetworkConfigApi` (the decision engine) and
//! `ControllerAdminApi` over the membership cache, the rate limiter and the
//! record store.
//!
//! ## Serialization
//!
//! Decisions and admin mutations for one network run under that network's
//! decision lock, from the network lookup until the member is written back.
//! Different networks never contend.

mod admin;
mod maintenance;
mod request;

pub use maintenance::MaintenanceReport;

use crate::adapters::diagnostics::{diagnostics_channel, DiagnosticsCollector, DiagnosticsSink};
use crate::cache::MembershipCache;
use crate::domain::{
    CircuitTestReport, ControllerConfig, ControllerError, Network, NetworkId, NodeAddress,
    Timestamp,
};
use crate::ports::{NetworkStore, TimeSource};
use crate::rate_limit::RequestRateLimiter;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// External dependencies of the controller.
pub struct ControllerDependencies {
    /// Durable record store
    pub store: Arc<dyn NetworkStore>,
    /// Clock
    pub time_source: Arc<dyn TimeSource>,
}

/// The network controller.
pub struct ControllerService {
    pub(crate) controller_address: NodeAddress,
    pub(crate) config: ControllerConfig,
    pub(crate) store: Arc<dyn NetworkStore>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) cache: MembershipCache,
    pub(crate) rate_limiter: RequestRateLimiter,
    pub(crate) network_locks: DashMap<NetworkId, Arc<tokio::sync::Mutex<()>>>,
    pub(crate) diagnostics: DiagnosticsCollector,
    diagnostics_sink: DiagnosticsSink,
    diagnostics_rx: Mutex<Option<mpsc::Receiver<CircuitTestReport>>>,
}

impl ControllerService {
    /// Create a controller answering as `controller_address`.
    pub fn new(
        controller_address: NodeAddress,
        config: ControllerConfig,
        deps: ControllerDependencies,
    ) -> Self {
        let cache = MembershipCache::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.time_source),
            config.cache_expiry_ms,
            config.recent_log_capacity,
        );
        let (diagnostics_sink, rx) = diagnostics_channel(config.diagnostics_channel_capacity);
        Self {
            controller_address,
            rate_limiter: RequestRateLimiter::new(config.min_request_interval_ms),
            store: deps.store,
            time_source: deps.time_source,
            cache,
            network_locks: DashMap::new(),
            diagnostics: DiagnosticsCollector::new(),
            diagnostics_sink,
            diagnostics_rx: Mutex::new(Some(rx)),
            config,
        }
    }

    /// Address this controller answers as.
    pub fn controller_address(&self) -> NodeAddress {
        self.controller_address
    }

    /// Active configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Membership cache.
    pub fn cache(&self) -> &MembershipCache {
        &self.cache
    }

    /// Handle for submitting circuit test reports.
    pub fn diagnostics_sink(&self) -> DiagnosticsSink {
        self.diagnostics_sink.clone()
    }

    /// Start the task draining the diagnostics channel. Returns `None` if it
    /// was already started.
    pub fn spawn_diagnostics(&self) -> Option<JoinHandle<()>> {
        let rx = self.diagnostics_rx.lock().take()?;
        Some(self.diagnostics.spawn(rx))
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now_ms()
    }

    /// Decision lock of one network.
    pub(crate) fn network_lock(&self, nwid: NetworkId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            &self
                .network_locks
                .entry(nwid)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Read and canonicalize a network record.
    pub(crate) async fn load_network(&self, nwid: NetworkId) -> Result<Network, ControllerError> {
        let now = self.now();
        match self.store.read_network(nwid).await? {
            Some(mut network) => {
                network.canonicalize(nwid, now)?;
                Ok(network)
            }
            None => Err(ControllerError::NetworkNotFound(nwid)),
        }
    }
}

impl std::fmt::Debug for ControllerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerService")
            .field("controller_address", &self.controller_address)
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}
