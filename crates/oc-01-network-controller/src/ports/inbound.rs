//! # Inbound Ports (Driving Ports)
//!
//! The APIs the controller exposes: the per-request decision entry point
//! and the administrative surface.

use crate::domain::{
    CircuitTest, ControllerError, Identity, Member, MemberUpdate, Network, NetworkConfig,
    NetworkId, NetworkUpdate, NodeAddress, RequestMetadata, ResultCode, Timestamp,
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// A node asking for its configuration on one network.
#[derive(Clone, Debug)]
pub struct ConfigRequest {
    /// Physical source of the request, if known
    pub from: Option<SocketAddr>,
    /// Identity the controller answers as
    pub signing_identity: Identity,
    /// Requesting node
    pub identity: Identity,
    /// Network requested
    pub network_id: NetworkId,
    /// Version and token metadata
    pub metadata: RequestMetadata,
}

impl ConfigRequest {
    /// Request with empty metadata and no source address.
    pub fn new(signing_identity: Identity, identity: Identity, network_id: NetworkId) -> Self {
        Self {
            from: None,
            signing_identity,
            identity,
            network_id,
            metadata: RequestMetadata::default(),
        }
    }

    /// Attach a source address.
    pub fn with_from(mut self, from: SocketAddr) -> Self {
        self.from = Some(from);
        self
    }

    /// Attach request metadata.
    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Decision entry point.
#[async_trait]
pub trait NetworkConfigApi: Send + Sync {
    /// Decide whether the requester may join and build its configuration.
    ///
    /// ## Errors
    ///
    /// - `RateLimited`: same requester asked within the minimum interval
    /// - `NetworkNotFound`: unknown network, or not owned by the signer
    /// - `AccessDenied`: member not authorized
    /// - `TemporarilyUnavailable`: store unreachable
    /// - `Internal`: corrupt record
    async fn request_network_config(
        &self,
        request: ConfigRequest,
    ) -> Result<NetworkConfig, ControllerError>;

    /// Same decision, flattened to a result code and optional config.
    async fn resolve_network_config(
        &self,
        request: ConfigRequest,
    ) -> (ResultCode, Option<NetworkConfig>) {
        match self.request_network_config(request).await {
            Ok(config) => (ResultCode::Ok, Some(config)),
            Err(e) => (ResultCode::from(&e), None),
        }
    }
}

/// Network record plus live membership counts.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    /// The stored record
    #[serde(flatten)]
    pub network: Network,
    /// Authorized members
    pub authorized_member_count: usize,
    /// Members seen within the liveness window
    pub active_member_count: usize,
    /// All members
    pub total_member_count: usize,
    /// Controller clock
    pub clock: Timestamp,
}

/// Administrative surface over networks, members and circuit tests.
///
/// Every mutation is serialized with configuration decisions for the same
/// network and invalidates that network's cache entry.
#[async_trait]
pub trait ControllerAdminApi: Send + Sync {
    /// Every network id in the store.
    async fn list_networks(&self) -> Result<Vec<NetworkId>, ControllerError>;

    /// Network record with membership counts.
    async fn get_network(&self, nwid: NetworkId) -> Result<NetworkSummary, ControllerError>;

    /// Create a network. Without an explicit id a random suffix under this
    /// controller's address is chosen.
    async fn create_network(
        &self,
        nwid: Option<NetworkId>,
        update: NetworkUpdate,
    ) -> Result<Network, ControllerError>;

    /// Patch a network; bumps its revision.
    async fn update_network(
        &self,
        nwid: NetworkId,
        update: NetworkUpdate,
    ) -> Result<Network, ControllerError>;

    /// Delete a network and every member record.
    async fn delete_network(&self, nwid: NetworkId) -> Result<(), ControllerError>;

    /// Member addresses with their record revisions.
    async fn list_members(
        &self,
        nwid: NetworkId,
    ) -> Result<BTreeMap<NodeAddress, u64>, ControllerError>;

    /// One member record.
    async fn get_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Member, ControllerError>;

    /// Patch a member, creating it if absent.
    async fn update_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
        update: MemberUpdate,
    ) -> Result<Member, ControllerError>;

    /// Delete a member record.
    async fn delete_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<(), ControllerError>;

    /// Start collecting reports for a circuit test on `nwid`.
    async fn register_circuit_test(
        &self,
        nwid: NetworkId,
        test_id: u64,
    ) -> Result<(), ControllerError>;

    /// Reports collected so far for a test.
    async fn circuit_test_results(&self, test_id: u64) -> Option<CircuitTest>;

    /// Stop collecting for a test. Returns whether it was registered.
    async fn remove_circuit_test(&self, test_id: u64) -> bool;
}
