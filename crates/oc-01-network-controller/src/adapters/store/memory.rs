//! In-memory record store for tests and simulations.
//!
//! Supports fault injection (failing reads or writes) and an artificial
//! write delay to widen race windows in concurrency tests.

use crate::domain::{Member, Network, NetworkId, NodeAddress, StoreError};
use crate::ports::NetworkStore;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Store backed by ordered maps behind `parking_lot` locks.
#[derive(Debug, Default)]
pub struct InMemoryNetworkStore {
    networks: RwLock<BTreeMap<NetworkId, Network>>,
    members: RwLock<BTreeMap<(NetworkId, NodeAddress), Member>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    member_writes: AtomicU64,
    member_list_reads: AtomicU64,
}

impl InMemoryNetworkStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail with `StoreError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every member write.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// Number of successful member writes.
    pub fn member_write_count(&self) -> u64 {
        self.member_writes.load(Ordering::SeqCst)
    }

    /// Number of member listings served (one per cache refresh).
    pub fn member_list_count(&self) -> u64 {
        self.member_list_reads.load(Ordering::SeqCst)
    }

    /// Store a member record under an arbitrary key, skipping all checks.
    pub fn insert_member_raw(&self, nwid: NetworkId, address: NodeAddress, member: Member) {
        self.members.write().insert((nwid, address), member);
    }

    /// Store a network record under an arbitrary key, skipping all checks.
    pub fn insert_network_raw(&self, nwid: NetworkId, network: Network) {
        self.networks.write().insert(nwid, network);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkStore for InMemoryNetworkStore {
    async fn read_network(&self, nwid: NetworkId) -> Result<Option<Network>, StoreError> {
        self.check_read()?;
        Ok(self.networks.read().get(&nwid).cloned())
    }

    async fn read_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Option<Member>, StoreError> {
        self.check_read()?;
        Ok(self.members.read().get(&(nwid, address)).cloned())
    }

    async fn write_network(&self, network: &Network) -> Result<(), StoreError> {
        self.check_write()?;
        self.networks.write().insert(network.id, network.clone());
        Ok(())
    }

    async fn write_member(&self, member: &Member) -> Result<(), StoreError> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_write()?;
        self.members.write().insert((member.network_id, member.address), member.clone());
        self.member_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_member_addresses(&self, nwid: NetworkId) -> Result<Vec<NodeAddress>, StoreError> {
        self.check_read()?;
        self.member_list_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .members
            .read()
            .range((nwid, NodeAddress(0))..=(nwid, NodeAddress(u64::MAX)))
            .map(|((_, addr), _)| *addr)
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkId>, StoreError> {
        self.check_read()?;
        Ok(self.networks.read().keys().copied().collect())
    }

    async fn delete_network(&self, nwid: NetworkId) -> Result<(), StoreError> {
        self.check_write()?;
        self.networks.write().remove(&nwid);
        self.members.write().retain(|(n, _), _| *n != nwid);
        Ok(())
    }

    async fn delete_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<bool, StoreError> {
        self.check_write()?;
        Ok(self.members.write().remove(&(nwid, address)).is_some())
    }
}
