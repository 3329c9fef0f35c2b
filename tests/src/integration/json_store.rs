//! # JSON Directory Store Flows
//!
//! The controller running over on-disk records: restarts, operator hand
//! edits, damaged files and deletions.

use super::fixtures::{request, Harness};
use oc_01_network_controller::{
    ControllerAdminApi, ControllerConfig, JsonDirectoryStore, NetworkConfigApi, NetworkId,
    NodeAddress, ResultCode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NODE: NodeAddress = NodeAddress(0xdeadbeef01);

fn json_harness(root: &Path) -> Harness {
    Harness::with_store(
        Arc::new(JsonDirectoryStore::new(root)),
        ControllerConfig::default(),
    )
}

fn member_file(root: &Path, nwid: NetworkId, address: NodeAddress) -> PathBuf {
    root.join("network")
        .join(nwid.to_string())
        .join("member")
        .join(address.to_string())
        .join("config.json")
}

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let nwid;
    let before;
    {
        let h = json_harness(dir.path());
        nwid = h.network(1, false, ("10.7.0.1", "10.7.0.254")).await;
        before = h
            .service
            .request_network_config(request(nwid, NODE))
            .await
            .unwrap();
    }

    let record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(member_file(dir.path(), nwid, NODE)).unwrap())
            .unwrap();
    assert_eq!(record["authorized"], serde_json::json!(true));
    assert_eq!(record["address"], serde_json::json!(NODE.to_string()));

    let h = json_harness(dir.path());
    assert_eq!(h.service.list_networks().await.unwrap(), vec![nwid]);
    let after = h
        .service
        .request_network_config(request(nwid, NODE))
        .await
        .unwrap();
    assert_eq!(before.static_ips, after.static_ips);
    assert_eq!(h.service.get_member(nwid, NODE).await.unwrap().revision, 2);
}

#[tokio::test]
async fn test_hand_edit_visible_after_cache_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let h = json_harness(dir.path());
    let nwid = h.network(2, false, ("10.7.0.1", "10.7.0.254")).await;
    h.service
        .request_network_config(request(nwid, NODE))
        .await
        .unwrap();

    let path = member_file(dir.path(), nwid, NODE);
    let mut record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    record["activeBridge"] = serde_json::json!(true);
    std::fs::write(&path, serde_json::to_vec_pretty(&record).unwrap()).unwrap();

    h.clock
        .advance(h.service.config().cache_expiry_ms + 1_000);
    let config = h
        .service
        .request_network_config(request(nwid, NODE))
        .await
        .unwrap();
    assert_eq!(config.active_bridges, vec![NODE]);
}

#[tokio::test]
async fn test_damaged_member_file_is_internal_error() {
    let dir = tempfile::tempdir().unwrap();
    let h = json_harness(dir.path());
    let nwid = h.network(3, false, ("10.7.0.1", "10.7.0.254")).await;

    let damaged = member_file(dir.path(), nwid, NodeAddress(0x77));
    std::fs::create_dir_all(damaged.parent().unwrap()).unwrap();
    std::fs::write(&damaged, b"{ truncated").unwrap();

    let (code, config) = h.service.resolve_network_config(request(nwid, NODE)).await;
    assert_eq!(code, ResultCode::InternalError);
    assert!(config.is_none());
}

#[tokio::test]
async fn test_delete_network_removes_directory() {
    let dir = tempfile::tempdir().unwrap();
    let h = json_harness(dir.path());
    let nwid = h.network(4, false, ("10.7.0.1", "10.7.0.254")).await;
    h.service
        .request_network_config(request(nwid, NODE))
        .await
        .unwrap();

    h.service.delete_network(nwid).await.unwrap();
    assert!(!dir.path().join("network").join(nwid.to_string()).exists());
    assert!(h.service.list_networks().await.unwrap().is_empty());
}
