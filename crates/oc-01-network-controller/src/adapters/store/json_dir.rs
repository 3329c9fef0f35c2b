//! JSON directory store.
//!
//! ```text
//! <root>/network/<nwid>/config.json
//! <root>/network/<nwid>/member/<address>/config.json
//! ```
//!
//! Records are pretty-printed JSON. Writes go to a temp file in the same
//! directory and are renamed into place, so readers never see a partial
//! record.

use crate::domain::{Member, Network, NetworkId, NodeAddress, StoreError};
use crate::ports::NetworkStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::warn;

const RECORD_FILE: &str = "config.json";

/// File-backed record store.
#[derive(Debug)]
pub struct JsonDirectoryStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl JsonDirectoryStore {
    /// Store rooted at `root`. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn networks_dir(&self) -> PathBuf {
        self.root.join("network")
    }

    fn network_dir(&self, nwid: NetworkId) -> PathBuf {
        self.networks_dir().join(nwid.to_string())
    }

    fn members_dir(&self, nwid: NetworkId) -> PathBuf {
        self.network_dir(nwid).join("member")
    }

    fn member_dir(&self, nwid: NetworkId, address: NodeAddress) -> PathBuf {
        self.members_dir(nwid).join(address.to_string())
    }

    async fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))
    }

    async fn write_record<T: Serialize + Sync>(
        &self,
        dir: &Path,
        record: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;

        let seq = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!("{}.tmp.{}", RECORD_FILE, seq));
        let target = dir.join(RECORD_FILE);
        fs::write(&tmp, &json).await.map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(&target, e));
        }
        Ok(())
    }

    /// Parsed names of the subdirectories of `dir`. Unparseable names are
    /// skipped with a warning.
    async fn list_dir<T: std::str::FromStr>(&self, dir: &Path) -> Result<Vec<T>, StoreError> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(dir, e)),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match name.parse::<T>() {
                Ok(id) => out.push(id),
                Err(_) => warn!(
                    dir = %dir.display(),
                    entry = name,
                    "[oc-01] Skipping unrecognized store entry"
                ),
            }
        }
        Ok(out)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl NetworkStore for JsonDirectoryStore {
    async fn read_network(&self, nwid: NetworkId) -> Result<Option<Network>, StoreError> {
        self.read_record(&self.network_dir(nwid).join(RECORD_FILE))
            .await
    }

    async fn read_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<Option<Member>, StoreError> {
        self.read_record(&self.member_dir(nwid, address).join(RECORD_FILE))
            .await
    }

    async fn write_network(&self, network: &Network) -> Result<(), StoreError> {
        self.write_record(&self.network_dir(network.id), network)
            .await
    }

    async fn write_member(&self, member: &Member) -> Result<(), StoreError> {
        self.write_record(&self.member_dir(member.network_id, member.address), member)
            .await
    }

    async fn list_member_addresses(
        &self,
        nwid: NetworkId,
    ) -> Result<Vec<NodeAddress>, StoreError> {
        let mut addresses: Vec<NodeAddress> = self.list_dir(&self.members_dir(nwid)).await?;
        addresses.sort_unstable();
        Ok(addresses)
    }

    async fn list_networks(&self) -> Result<Vec<NetworkId>, StoreError> {
        let mut ids: Vec<NetworkId> = self.list_dir(&self.networks_dir()).await?;
        ids.sort_unstable();
        Ok(ids)
    }

    async fn delete_network(&self, nwid: NetworkId) -> Result<(), StoreError> {
        let dir = self.network_dir(nwid);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&dir, e)),
        }
    }

    async fn delete_member(
        &self,
        nwid: NetworkId,
        address: NodeAddress,
    ) -> Result<bool, StoreError> {
        let dir = self.member_dir(nwid, address);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NWID: NetworkId = NetworkId(0x8056c2e21c000001);
    const ADDR: NodeAddress = NodeAddress(0xdeadbeef01);

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirectoryStore::new(dir.path());
        store.write_network(&Network::new(NWID, "lab", 1)).await.unwrap();
        store.write_member(&Member::new(NWID, ADDR, 1)).await.unwrap();

        assert!(dir
            .path()
            .join("network/8056c2e21c000001/config.json")
            .exists());
        assert!(dir
            .path()
            .join("network/8056c2e21c000001/member/deadbeef01/config.json")
            .exists());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirectoryStore::new(dir.path());
        let mut member = Member::new(NWID, ADDR, 1);
        member.authorized = true;
        member.ip_assignments.push("10.0.0.9".parse().unwrap());
        store.write_member(&member).await.unwrap();

        let read = store.read_member(NWID, ADDR).await.unwrap().unwrap();
        assert_eq!(read, member);
        assert_eq!(store.list_member_addresses(NWID).await.unwrap(), vec![ADDR]);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirectoryStore::new(dir.path());
        assert!(store.read_network(NWID).await.unwrap().is_none());
        assert!(store.list_networks().await.unwrap().is_empty());
        assert!(!store.delete_member(NWID, ADDR).await.unwrap());
        store.delete_network(NWID).await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_record_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirectoryStore::new(dir.path());
        let net_dir = dir.path().join("network/8056c2e21c000001");
        std::fs::create_dir_all(&net_dir).unwrap();
        std::fs::write(net_dir.join("config.json"), b"{not json").unwrap();

        assert!(matches!(
            store.read_network(NWID).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_stray_entries_skipped() {
        let dir = TempDir::new().unwrap();
        let store = JsonDirectoryStore::new(dir.path());
        store.write_network(&Network::new(NWID, "lab", 1)).await.unwrap();
        std::fs::create_dir_all(dir.path().join("network/not-a-network")).unwrap();

        assert_eq!(store.list_networks().await.unwrap(), vec![NWID]);
    }
}
