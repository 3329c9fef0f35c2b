//! Shared harness for integration flows.

use std::sync::Arc;

use oc_01_network_controller::domain::IpAssignmentPool;
use oc_01_network_controller::{
    ConfigRequest, ControllerAdminApi, ControllerConfig, ControllerDependencies,
    ControllerService, Identity, InMemoryNetworkStore, ManualTimeSource, NetworkId, NetworkStore,
    NetworkUpdate, NodeAddress, Timestamp,
};

pub const CONTROLLER: NodeAddress = NodeAddress(0x8056c2e21c);
pub const START: Timestamp = 1_700_000_000_000;

pub struct Harness {
    pub store: Arc<dyn NetworkStore>,
    pub clock: Arc<ManualTimeSource>,
    pub service: Arc<ControllerService>,
}

impl Harness {
    pub fn with_store(store: Arc<dyn NetworkStore>, config: ControllerConfig) -> Self {
        let clock = Arc::new(ManualTimeSource::new(START));
        let service = Arc::new(ControllerService::new(
            CONTROLLER,
            config,
            ControllerDependencies {
                store: Arc::clone(&store),
                time_source: clock.clone(),
            },
        ));
        Self {
            store,
            clock,
            service,
        }
    }

    pub fn in_memory() -> Self {
        Self::with_store(
            Arc::new(InMemoryNetworkStore::new()),
            ControllerConfig::default(),
        )
    }

    /// Create a network with a v4 pool and the given privacy.
    pub async fn network(&self, suffix: u32, private: bool, pool: (&str, &str)) -> NetworkId {
        let nwid = NetworkId::for_controller(CONTROLLER, suffix);
        let update = NetworkUpdate {
            name: Some(format!("net-{}", suffix)),
            private: Some(private),
            v4_assign_mode: Some(oc_01_network_controller::domain::V4AssignMode { zt: true }),
            ip_assignment_pools: Some(vec![IpAssignmentPool::new(
                pool.0.parse().unwrap(),
                pool.1.parse().unwrap(),
            )]),
            ..Default::default()
        };
        self.service
            .create_network(Some(nwid), update)
            .await
            .unwrap();
        nwid
    }
}

pub fn identity(address: NodeAddress) -> Identity {
    Identity::new(address, address.to_bytes().to_vec())
}

pub fn request(nwid: NetworkId, address: NodeAddress) -> ConfigRequest {
    ConfigRequest::new(
        Identity::new(nwid.controller(), Vec::new()),
        identity(address),
        nwid,
    )
}
