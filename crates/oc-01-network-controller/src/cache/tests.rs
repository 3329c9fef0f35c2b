use super::*;
use crate::adapters::{InMemoryNetworkStore, ManualTimeSource};
use std::time::Duration;

const NWID: NetworkId = NetworkId(0x8056c2e21c000001);
const EXPIRY: u64 = 30_000;

struct Fixture {
    store: Arc<InMemoryNetworkStore>,
    clock: Arc<ManualTimeSource>,
    cache: Arc<MembershipCache>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryNetworkStore::new());
    let clock = Arc::new(ManualTimeSource::new(1_000_000));
    let cache = Arc::new(MembershipCache::new(
        store.clone(),
        clock.clone(),
        EXPIRY,
        25,
    ));
    Fixture {
        store,
        clock,
        cache,
    }
}

fn member(addr: u64) -> Member {
    Member::new(NWID, NodeAddress(addr), 1_000_000)
}

#[tokio::test]
async fn test_miss_reads_store_once() {
    let f = fixture();
    f.store.write_member(&member(1)).await.unwrap();

    let first = f.cache.get_all_members(NWID).await.unwrap();
    let second = f.cache.get_all_members(NWID).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(f.store.member_list_count(), 1);
}

#[tokio::test]
async fn test_expired_entry_refreshes() {
    let f = fixture();
    f.cache.get_all_members(NWID).await.unwrap();
    f.store.write_member(&member(2)).await.unwrap();

    f.clock.advance(EXPIRY - 1);
    assert!(f.cache.get_all_members(NWID).await.unwrap().is_empty());

    f.clock.advance(1);
    assert_eq!(f.cache.get_all_members(NWID).await.unwrap().len(), 1);
    assert_eq!(f.store.member_list_count(), 2);
}

#[tokio::test]
async fn test_put_member_writes_through() {
    let f = fixture();
    let before = f.cache.get_all_members(NWID).await.unwrap();

    let mut m = member(3);
    m.authorized = true;
    f.cache.put_member(m.clone()).await.unwrap();

    let cached = f.cache.get_member(NWID, NodeAddress(3)).await.unwrap();
    assert_eq!(cached, Some(m.clone()));
    assert_eq!(f.store.read_member(NWID, NodeAddress(3)).await.unwrap(), Some(m));
    assert!(before.is_empty(), "readers keep their snapshot");
    assert_eq!(f.store.member_list_count(), 1);
}

#[tokio::test]
async fn test_invalidate_forces_reread() {
    let f = fixture();
    f.cache.get_all_members(NWID).await.unwrap();
    f.store.write_member(&member(4)).await.unwrap();

    f.cache.invalidate(NWID);
    assert_eq!(f.cache.get_all_members(NWID).await.unwrap().len(), 1);
    assert_eq!(f.store.member_list_count(), 2);
}

#[tokio::test]
async fn test_store_failure_serves_stale() {
    let f = fixture();
    f.store.write_member(&member(5)).await.unwrap();
    f.cache.get_all_members(NWID).await.unwrap();

    f.store.set_fail_reads(true);
    f.clock.advance(EXPIRY * 10);
    let stale = f.cache.get_all_members(NWID).await.unwrap();
    assert_eq!(stale.len(), 1);
}

#[tokio::test]
async fn test_store_failure_without_entry_errors() {
    let f = fixture();
    f.store.set_fail_reads(true);
    let result = f.cache.get_all_members(NWID).await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_corrupt_member_record() {
    let f = fixture();
    f.store
        .insert_member_raw(NWID, NodeAddress(6), Member::new(NWID, NodeAddress(7), 0));
    let result = f.cache.get_all_members(NWID).await;
    assert!(matches!(result, Err(StoreError::Corrupt { .. })));
}

#[tokio::test]
async fn test_members_canonicalized_on_load() {
    let f = fixture();
    let mut raw = Member::default();
    raw.capabilities = vec![3, 1, 3];
    f.store.insert_member_raw(NWID, NodeAddress(8), raw);

    let m = f
        .cache
        .get_member(NWID, NodeAddress(8))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m.address, NodeAddress(8));
    assert_eq!(m.network_id, NWID);
    assert_eq!(m.capabilities, vec![1, 3]);
    assert_eq!(m.creation_time, 1_000_000);
}

#[tokio::test]
async fn test_evict_expired() {
    let f = fixture();
    f.cache.get_all_members(NWID).await.unwrap();
    f.cache.get_all_members(NetworkId(2)).await.unwrap();
    assert_eq!(f.cache.cached_networks(), 2);

    assert_eq!(f.cache.evict_expired(1_000_000 + EXPIRY - 1), 0);
    assert_eq!(f.cache.evict_expired(1_000_000 + EXPIRY), 2);
    assert_eq!(f.cache.cached_networks(), 0);
}

#[tokio::test]
async fn test_refresh_does_not_install_over_inflight_write() {
    let f = fixture();
    f.cache.get_all_members(NWID).await.unwrap();
    f.cache.invalidate(NWID);

    f.store.set_write_delay(Some(Duration::from_millis(50)));
    let cache = Arc::clone(&f.cache);
    let writer = tokio::spawn(async move { cache.put_member(member(9)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let lists_before = f.store.member_list_count();
    let during = f.cache.get_all_members(NWID).await.unwrap();
    assert!(during.get(&NodeAddress(9)).is_none());
    assert_eq!(
        f.store.member_list_count() - lists_before,
        MAX_REFRESH_ATTEMPTS as u64
    );

    writer.await.unwrap().unwrap();
    f.store.set_write_delay(None);

    let after = f.cache.get_all_members(NWID).await.unwrap();
    assert!(after.get(&NodeAddress(9)).is_some());
    let lists = f.store.member_list_count();
    f.cache.get_all_members(NWID).await.unwrap();
    assert_eq!(f.store.member_list_count(), lists, "refresh was installed");
}
