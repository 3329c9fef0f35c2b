//! Administrative operations.

use super::ControllerService;
use crate::domain::{
    CircuitTest, ControllerError, Member, MemberUpdate, Network, NetworkId, NetworkUpdate,
    NodeAddress,
};
use crate::ports::{ControllerAdminApi, NetworkSummary};
use async_trait::async_trait;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::info;

/// Random suffixes tried before giving up on creating a network.
const MAX_NETWORK_ID_ATTEMPTS: usize = 16;

impl ControllerService {
    async fn pick_network_id(&self) -> Result<NetworkId, ControllerError> {
        for _ in 0..MAX_NETWORK_ID_ATTEMPTS {
            let suffix: u32 = rand::thread_rng().gen_range(0..=0x00ff_ffff);
            let nwid = NetworkId::for_controller(self.controller_address, suffix);
            if self.store.read_network(nwid).await?.is_none() {
                return Ok(nwid);
            }
        }
        Err(ControllerError::InvalidRecord(
            "no free network id under this controller".to_string(),
        ))
    }
}

#[async_trait]
impl ControllerAdminApi for ControllerService {
    async fn list_networks(&self) -> Result<Vec<NetworkId>, ControllerError> {
        Ok(self.store.list_networks().await?)
    }

    async fn get_network(&self, nwid: NetworkId) -> Result<NetworkSummary, ControllerError> {
        let network = self.load_network(nwid).await?;
        let now = self.now();
        let aggregate = self
            .cache
            .aggregate(nwid, now, self.config.active_member_window_ms)
            .await?;
        Ok(NetworkSummary {
            network,
            authorized_member_count: aggregate.authorized_member_count,
            active_member_count: aggregate.active_member_count,
            total_member_count: aggregate.total_member_count,
            clock: now,
        })
    }

    async fn create_network(
        &self,
        nwid: Option<NetworkId>,
        update: NetworkUpdate,
    ) -> Result<Network, ControllerError> {
        let nwid = match nwid {
            Some(id) if id.controller() != self.controller_address => {
                return Err(ControllerError::InvalidRecord(format!(
                    "network {} is not owned by controller {}",
                    id, self.controller_address
                )));
            }
            Some(id) => id,
            None => self.pick_network_id().await?,
        };

        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        if self.store.read_network(nwid).await?.is_some() {
            return Err(ControllerError::InvalidRecord(format!(
                "network {} already exists",
                nwid
            )));
        }

        let now = self.now();
        let mut network = Network::new(nwid, "", now);
        update.apply(&mut network);
        network.canonicalize(nwid, now)?;
        network.validate()?;
        network.revision = 1;

        self.store.write_network(&network).await?;
        self.cache.invalidate(nwid);
        info!(network = %nwid, name = %network.name, "[oc-01] Network created");
        Ok(network)
    }

    async fn update_network(
        &self,
        nwid: NetworkId,
        update: NetworkUpdate,
    ) -> Result<Network, ControllerError> {
        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        let mut network = self.load_network(nwid).await?;

        update.apply(&mut network);
        network.canonicalize(nwid, self.now())?;
        network.validate()?;
        network.revision += 1;

        self.store.write_network(&network).await?;
        self.cache.invalidate(nwid);
        info!(network = %nwid, revision = network.revision, "[oc-01] Network updated");
        Ok(network)
    }

    async fn delete_network(&self, nwid: NetworkId) -> Result<(), ControllerError> {
        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        self.load_network(nwid).await?;

        self.store.delete_network(nwid).await?;
        self.cache.invalidate(nwid);
        info!(network = %nwid, "[oc-01] Network deleted");
        Ok(())
    }

    async fn list_members(
        &self,
        nwid: NetworkId,
    ) -> Result<BTreeMap<NodeAddress, u64>, ControllerError> {
        self.load_network(nwid).await?;
        let snapshot = self.cache.get_all_members(nwid).await?;
        Ok(snapshot
            .iter()
            .map(|(address, member)| (*address, member.revision))
            .collect())
    }

    async fn get_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Member, ControllerError> {
        self.load_network(nwid).await?;
        self.cache
            .get_member(nwid, address)
            .await?
            .ok_or(ControllerError::MemberNotFound {
                network: nwid,
                member: address,
            })
    }

    async fn update_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
        update: MemberUpdate,
    ) -> Result<Member, ControllerError> {
        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        self.load_network(nwid).await?;

        let now = self.now();
        let mut member = match self.cache.get_member(nwid, address).await? {
            Some(existing) => existing,
            None => Member::new(nwid, address, now),
        };
        let was_authorized = member.authorized;
        update.apply(&mut member, now);
        member.canonicalize(nwid, address, now, self.config.recent_log_capacity)?;
        member.revision += 1;

        self.store.write_member(&member).await?;
        self.cache.invalidate(nwid);
        if was_authorized != member.authorized {
            info!(
                network = %nwid,
                member = %address,
                authorized = member.authorized,
                "[oc-01] Member authorization changed"
            );
        }
        Ok(member)
    }

    async fn delete_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<(), ControllerError> {
        let lock = self.network_lock(nwid);
        let _guard = lock.lock().await;
        self.load_network(nwid).await?;

        let existed = self.store.delete_member(nwid, address).await?;
        self.cache.invalidate(nwid);
        if !existed {
            return Err(ControllerError::MemberNotFound {
                network: nwid,
                member: address,
            });
        }
        info!(network = %nwid, member = %address, "[oc-01] Member deleted");
        Ok(())
    }

    async fn register_circuit_test(
        &self,
        nwid: NetworkId,
        test_id: u64,
    ) -> Result<(), ControllerError> {
        self.load_network(nwid).await?;
        self.diagnostics.register(test_id, nwid, self.now());
        info!(network = %nwid, test_id, "[oc-01] Circuit test registered");
        Ok(())
    }

    async fn circuit_test_results(&self, test_id: u64) -> Option<CircuitTest> {
        self.diagnostics.results(test_id)
    }

    async fn remove_circuit_test(&self, test_id: u64) -> bool {
        self.diagnostics.remove(test_id)
    }
}
