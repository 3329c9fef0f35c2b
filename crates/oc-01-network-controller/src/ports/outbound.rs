//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the controller: durable record storage and a
//! clock.

use crate::domain::{Member, Network, NetworkId, NodeAddress, StoreError, Timestamp};
use async_trait::async_trait;

/// Durable storage of network and member records.
///
/// Records are returned as stored. Canonicalization is the caller's job.
/// `Ok(None)` means the record does not exist; `Err` means the store could
/// not answer.
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// Read a network record.
    async fn read_network(&self, nwid: NetworkId) -> Result<Option<Network>, StoreError>;

    /// Read one member record.
    async fn read_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Option<Member>, StoreError>;

    /// Create or replace a network record.
    async fn write_network(&self, network: &Network) -> Result<(), StoreError>;

    /// Create or replace a member record.
    async fn write_member(&self, member: &Member) -> Result<(), StoreError>;

    /// Addresses of every member record of a network.
    async fn list_member_addresses(&self, nwid: NetworkId)
        -> Result<Vec<NodeAddress>, StoreError>;

    /// Every stored network id.
    async fn list_networks(&self) -> Result<Vec<NetworkId>, StoreError>;

    /// Remove a network and all of its members. Missing networks are not an
    /// error.
    async fn delete_network(&self, nwid: NetworkId) -> Result<(), StoreError>;

    /// Remove one member record. Returns whether it existed.
    async fn delete_member(&self, nwid: NetworkId, address: NodeAddress)
        -> Result<bool, StoreError>;

    /// Read every member record of a network.
    ///
    /// Members listed but gone by the time they are read are skipped.
    async fn read_all_members(
        &self,
        nwid: NetworkId,
    ) -> Result<Vec<(NodeAddress, Member)>, StoreError> {
        let addresses = self.list_member_addresses(nwid).await?;
        let mut members = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(member) = self.read_member(nwid, address).await? {
                members.push((address, member));
            }
        }
        Ok(members)
    }
}

/// Abstract time source, milliseconds since the Unix epoch.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> Timestamp;
}
