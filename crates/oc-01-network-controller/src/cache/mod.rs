//! # Membership Cache
//!
//! Write-through cache of member records per network, over a
//! [`NetworkStore`].
//!
//! ## Consistency
//!
//! Each network has a slot holding an immutable snapshot
//! (`Arc<BTreeMap<..>>`), its fill time, a write generation and a count of
//! writes still travelling to the store. No map guard is held across a
//! store round trip:
//!
//! - `put_member` bumps the generation and the in-flight count, patches the
//!   snapshot copy-on-write, writes to the store, then bumps the generation
//!   again and releases its in-flight count.
//! - A refresh notes the generation, reads the store unlocked, and installs
//!   its result only if the generation is unchanged and nothing is in
//!   flight. Otherwise it retries, and after the last attempt serves what it
//!   read without installing it.
//!
//! A refresh that fails at the store serves the previous snapshot, however
//! old, when there is one.

#[cfg(test)]
mod tests;

use crate::domain::{
    aggregate_snapshot, AggregateInfo, Member, NetworkId, NodeAddress, StoreError, Timestamp,
};
use crate::metrics;
use crate::ports::{NetworkStore, TimeSource};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable member snapshot of one network.
pub type MemberSnapshot = Arc<BTreeMap<NodeAddress, Member>>;

/// Refresh attempts before serving an uninstalled snapshot.
pub const MAX_REFRESH_ATTEMPTS: usize = 3;

#[derive(Debug)]
struct CacheSlot {
    snapshot: Option<MemberSnapshot>,
    filled_at: Timestamp,
    generation: u64,
    writes_in_flight: u32,
}

impl CacheSlot {
    fn empty(generation: u64) -> Self {
        Self {
            snapshot: None,
            filled_at: 0,
            generation,
            writes_in_flight: 0,
        }
    }
}

/// Per-network member cache.
pub struct MembershipCache {
    store: Arc<dyn NetworkStore>,
    time_source: Arc<dyn TimeSource>,
    slots: DashMap<NetworkId, CacheSlot>,
    epoch: AtomicU64,
    expiry_ms: u64,
    log_capacity: usize,
}

impl MembershipCache {
    /// Cache over `store`; entries older than `expiry_ms` are refreshed.
    pub fn new(
        store: Arc<dyn NetworkStore>,
        time_source: Arc<dyn TimeSource>,
        expiry_ms: u64,
        log_capacity: usize,
    ) -> Self {
        Self {
            store,
            time_source,
            slots: DashMap::new(),
            epoch: AtomicU64::new(1),
            expiry_ms,
            log_capacity,
        }
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn NetworkStore> {
        &self.store
    }

    /// One member, refreshing the network entry if needed.
    pub async fn get_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Option<Member>, StoreError> {
        let snapshot = self.get_all_members(nwid).await?;
        Ok(snapshot.get(&address).cloned())
    }

    /// Every member of a network, refreshing the entry if absent or stale.
    pub async fn get_all_members(&self, nwid: NetworkId) -> Result<MemberSnapshot, StoreError> {
        let now = self.time_source.now_ms();
        if let Some(snapshot) = self.fresh_snapshot(nwid, now) {
            return Ok(snapshot);
        }
        self.refresh(nwid).await
    }

    /// Aggregate over the current snapshot.
    pub async fn aggregate(
        &self,
        nwid: NetworkId,
        now: Timestamp,
        active_window: u64,
    ) -> Result<AggregateInfo, StoreError> {
        let snapshot = self.get_all_members(nwid).await?;
        Ok(aggregate_snapshot(&snapshot, now, active_window))
    }

    /// Update the cached member and write it to the store.
    ///
    /// The cached copy keeps the update even if the store write fails; the
    /// next successful write of the member persists it.
    pub async fn put_member(&self, member: Member) -> Result<(), StoreError> {
        let nwid = member.network_id;
        {
            let generation = self.next_generation();
            let mut slot = self
                .slots
                .entry(nwid)
                .or_insert_with(|| CacheSlot::empty(generation));
            slot.generation = generation;
            slot.writes_in_flight += 1;
            if let Some(snapshot) = slot.snapshot.as_mut() {
                Arc::make_mut(snapshot).insert(member.address, member.clone());
            }
        }

        let result = self.store.write_member(&member).await;

        let generation = self.next_generation();
        if let Some(mut slot) = self.slots.get_mut(&nwid) {
            slot.generation = generation;
            slot.writes_in_flight = slot.writes_in_flight.saturating_sub(1);
        }
        result
    }

    /// Drop the cached snapshot of a network. The next read goes to the
    /// store.
    pub fn invalidate(&self, nwid: NetworkId) {
        let generation = self.next_generation();
        if let Some(mut slot) = self.slots.get_mut(&nwid) {
            slot.snapshot = None;
            slot.generation = generation;
        }
    }

    /// Remove expired entries with no write in flight. Returns how many.
    pub fn evict_expired(&self, now: Timestamp) -> usize {
        let before = self.slots.len();
        let expiry = self.expiry_ms;
        self.slots.retain(|_, slot| {
            slot.writes_in_flight > 0
                || (slot.snapshot.is_some() && now.saturating_sub(slot.filled_at) < expiry)
        });
        before.saturating_sub(self.slots.len())
    }

    /// Number of networks with a slot.
    pub fn cached_networks(&self) -> usize {
        self.slots.len()
    }

    fn next_generation(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst)
    }

    fn fresh_snapshot(&self, nwid: NetworkId, now: Timestamp) -> Option<MemberSnapshot> {
        let slot = self.slots.get(&nwid)?;
        let snapshot = slot.snapshot.as_ref()?;
        if now.saturating_sub(slot.filled_at) < self.expiry_ms {
            Some(Arc::clone(snapshot))
        } else {
            None
        }
    }

    fn any_snapshot(&self, nwid: NetworkId) -> Option<MemberSnapshot> {
        self.slots.get(&nwid)?.snapshot.clone()
    }

    /// Generation a refresh must still see when it installs.
    fn begin_refresh(&self, nwid: NetworkId) -> u64 {
        let fresh = self.next_generation();
        self.slots
            .entry(nwid)
            .or_insert_with(|| CacheSlot::empty(fresh))
            .generation
    }

    fn try_install(
        &self,
        nwid: NetworkId,
        generation: u64,
        snapshot: &MemberSnapshot,
        now: Timestamp,
    ) -> bool {
        let Some(mut slot) = self.slots.get_mut(&nwid) else {
            return false;
        };
        if slot.generation != generation || slot.writes_in_flight > 0 {
            return false;
        }
        slot.snapshot = Some(Arc::clone(snapshot));
        slot.filled_at = now;
        true
    }

    async fn load(&self, nwid: NetworkId) -> Result<BTreeMap<NodeAddress, Member>, StoreError> {
        let now = self.time_source.now_ms();
        let records = self.store.read_all_members(nwid).await?;
        let mut members = BTreeMap::new();
        for (address, mut member) in records {
            member.canonicalize(nwid, address, now, self.log_capacity)?;
            members.insert(address, member);
        }
        Ok(members)
    }

    async fn refresh(&self, nwid: NetworkId) -> Result<MemberSnapshot, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let generation = self.begin_refresh(nwid);
            let members = match self.load(nwid).await {
                Ok(members) => members,
                Err(e) => {
                    if let Some(stale) = self.any_snapshot(nwid) {
                        warn!(
                            network = %nwid,
                            error = %e,
                            "[oc-01] Store read failed, serving stale members"
                        );
                        metrics::record_cache_refresh("stale_served");
                        return Ok(stale);
                    }
                    metrics::record_cache_refresh("failed");
                    return Err(e);
                }
            };

            let snapshot = Arc::new(members);
            let now = self.time_source.now_ms();
            if self.try_install(nwid, generation, &snapshot, now) {
                metrics::record_cache_refresh("installed");
                return Ok(snapshot);
            }
            if attempt >= MAX_REFRESH_ATTEMPTS {
                debug!(
                    network = %nwid,
                    attempts = attempt,
                    "[oc-01] Concurrent writes kept refresh from installing"
                );
                metrics::record_cache_refresh("uninstalled");
                return Ok(snapshot);
            }
            tokio::task::yield_now().await;
        }
    }
}

impl std::fmt::Debug for MembershipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipCache")
            .field("networks", &self.slots.len())
            .field("expiry_ms", &self.expiry_ms)
            .finish()
    }
}
