//! # Concurrency
//!
//! Parallel requests across networks, admin mutations racing decisions, and
//! the background maintenance task.

use super::fixtures::{request, Harness, START};
use oc_01_network_controller::{
    ControllerAdminApi, NetworkConfigApi, NetworkId, NetworkStore, NetworkUpdate, NodeAddress,
};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

async fn assert_unique_addresses(store: &Arc<dyn NetworkStore>, nwid: NetworkId, expected: usize) {
    let members = store.read_all_members(nwid).await.unwrap();
    assert_eq!(members.len(), expected);
    let mut seen: BTreeSet<IpAddr> = BTreeSet::new();
    for (address, member) in &members {
        assert_eq!(member.ip_assignments.len(), 1, "member {}", address);
        assert!(
            seen.insert(member.ip_assignments[0]),
            "{} assigned twice on {}",
            member.ip_assignments[0],
            nwid
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_across_networks() {
    let h = Harness::in_memory();
    let a = h.network(1, false, ("10.1.0.1", "10.1.0.100")).await;
    let b = h.network(2, false, ("10.1.0.1", "10.1.0.100")).await;

    let mut tasks = Vec::new();
    for raw in 1..=40u64 {
        for nwid in [a, b] {
            let service = Arc::clone(&h.service);
            tasks.push(tokio::spawn(async move {
                service
                    .request_network_config(request(nwid, NodeAddress(raw)))
                    .await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_unique_addresses(&h.store, a, 40).await;
    assert_unique_addresses(&h.store, b, 40).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_admin_updates_race_decisions() {
    let h = Harness::in_memory();
    let nwid = h.network(3, false, ("10.2.0.1", "10.2.0.100")).await;

    let requests: Vec<_> = (1..=20u64)
        .map(|raw| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move {
                service
                    .request_network_config(request(nwid, NodeAddress(raw)))
                    .await
            })
        })
        .collect();
    let admin = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            for i in 0..10 {
                service
                    .update_network(
                        nwid,
                        NetworkUpdate {
                            name: Some(format!("rename-{}", i)),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
            }
        })
    };

    for task in requests {
        task.await.unwrap().unwrap();
    }
    admin.await.unwrap();

    let network = h.store.read_network(nwid).await.unwrap().unwrap();
    assert_eq!(network.revision, 11);
    assert_eq!(network.name, "rename-9");
    assert_unique_addresses(&h.store, nwid, 20).await;
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_task_stops_with_service() {
    let h = Harness::in_memory();
    let nwid = h.network(4, false, ("10.3.0.1", "10.3.0.100")).await;
    h.service
        .request_network_config(request(nwid, NodeAddress(0x1)))
        .await
        .unwrap();
    assert_eq!(h.service.cache().cached_networks(), 1);

    h.clock.set(START + 3_600_000);
    let task = h.service.spawn_maintenance(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.service.cache().cached_networks(), 0);

    drop(h);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
