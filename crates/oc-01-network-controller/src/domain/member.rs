//! # Member Record
//!
//! Per-network membership record of one node.

use super::errors::StoreError;
use super::value_objects::{Identity, NetworkId, NodeAddress, RequestMetadata, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// Current on-disk schema version for member records.
pub const MEMBER_SCHEMA_VERSION: u32 = 3;

/// Default number of activity log entries kept per member.
pub const DEFAULT_RECENT_LOG_CAPACITY: usize = 25;

/// `lastAuthorizedBy` for authorization on contact with a public network.
pub const AUTHORIZED_BY_AUTO: &str = "auto";

/// `lastAuthorizedBy` for authorization via a network auth token.
pub const AUTHORIZED_BY_TOKEN: &str = "token";

/// `lastAuthorizedBy` for authorization through the admin surface.
pub const AUTHORIZED_BY_ADMIN: &str = "admin";

/// Membership of one node in one network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Member {
    /// Node address
    pub address: NodeAddress,
    /// Owning network
    pub network_id: NetworkId,
    /// May receive configurations
    pub authorized: bool,
    /// Last authorization time
    pub last_authorized_time: Timestamp,
    /// Who last authorized the member
    pub last_authorized_by: String,
    /// Last deauthorization time
    pub last_deauthorized_time: Timestamp,
    /// Identity fingerprint pinned on first contact
    pub identity: Option<String>,
    /// Assigned addresses, in assignment order
    pub ip_assignments: Vec<IpAddr>,
    /// Activity log, newest first
    pub recent_log: Vec<LogEntry>,
    /// Allowed to bridge
    pub active_bridge: bool,
    /// Member tag values
    pub tags: Vec<MemberTag>,
    /// Granted capability ids
    pub capabilities: Vec<u32>,
    /// Creation time
    pub creation_time: Timestamp,
    /// Skip automatic address assignment
    pub no_auto_assign_ips: bool,
    /// Bumped on every change
    pub revision: u64,
    /// Schema version of the stored record
    pub schema_version: u32,
}

/// `[id, value]` tag pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberTag(pub u32, pub u32);

/// One configuration request as seen by the controller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    /// Request time
    pub ts: Timestamp,
    /// Authorization state after the request
    pub authorized: bool,
    /// Authorization source at the time
    pub authorized_by: String,
    /// Physical source address
    pub from_address: Option<SocketAddr>,
    /// Node protocol version
    pub protocol_version: u32,
    /// Software major version
    pub version_major: u32,
    /// Software minor version
    pub version_minor: u32,
    /// Software revision
    pub version_revision: u32,
}

impl LogEntry {
    /// Build a log entry for a request.
    pub fn for_request(
        now: Timestamp,
        member: &Member,
        from: Option<SocketAddr>,
        metadata: &RequestMetadata,
    ) -> Self {
        Self {
            ts: now,
            authorized: member.authorized,
            authorized_by: member.last_authorized_by.clone(),
            from_address: from,
            protocol_version: metadata.protocol_version,
            version_major: metadata.version_major,
            version_minor: metadata.version_minor,
            version_revision: metadata.version_revision,
        }
    }
}

impl Member {
    /// Default record for a node seen for the first time.
    pub fn new(network_id: NetworkId, address: NodeAddress, now: Timestamp) -> Self {
        Self {
            address,
            network_id,
            creation_time: now,
            schema_version: MEMBER_SCHEMA_VERSION,
            ..Default::default()
        }
    }

    /// First-contact record with the requester's identity pinned.
    pub fn first_contact(network_id: NetworkId, identity: &Identity, now: Timestamp) -> Self {
        let mut member = Self::new(network_id, identity.address, now);
        member.identity = Some(identity.fingerprint());
        member
    }

    /// Storage key used in error reports.
    pub fn storage_key(network_id: NetworkId, address: NodeAddress) -> String {
        format!("network/{}/member/{}", network_id, address)
    }

    /// Normalize a record read from (or about to be written to) the store.
    pub fn canonicalize(
        &mut self,
        network_id: NetworkId,
        address: NodeAddress,
        now: Timestamp,
        log_capacity: usize,
    ) -> Result<(), StoreError> {
        let key = || Self::storage_key(network_id, address);
        if self.network_id != NetworkId::default() && self.network_id != network_id {
            return Err(StoreError::Corrupt {
                key: key(),
                reason: format!("record names network {}", self.network_id),
            });
        }
        if self.address != NodeAddress::default() && self.address != address {
            return Err(StoreError::Corrupt {
                key: key(),
                reason: format!("record names member {}", self.address),
            });
        }
        self.network_id = network_id;
        self.address = address;
        if self.creation_time == 0 {
            self.creation_time = now;
        }

        let mut seen = std::collections::BTreeSet::new();
        self.ip_assignments.retain(|ip| seen.insert(*ip));

        self.capabilities.sort_unstable();
        self.capabilities.dedup();

        let tags: BTreeMap<u32, u32> = self.tags.iter().map(|t| (t.0, t.1)).collect();
        self.tags = tags.into_iter().map(|(id, v)| MemberTag(id, v)).collect();

        self.recent_log.truncate(log_capacity);
        if self.schema_version < MEMBER_SCHEMA_VERSION {
            self.schema_version = MEMBER_SCHEMA_VERSION;
        }
        Ok(())
    }

    /// Mark authorized.
    pub fn authorize(&mut self, now: Timestamp, by: &str) {
        self.authorized = true;
        self.last_authorized_time = now;
        self.last_authorized_by = by.to_string();
    }

    /// Mark deauthorized.
    pub fn deauthorize(&mut self, now: Timestamp) {
        self.authorized = false;
        self.last_deauthorized_time = now;
    }

    /// Whether a deauthorization happened after the last authorization.
    pub fn deauthorized_since_authorization(&self) -> bool {
        self.last_deauthorized_time > self.last_authorized_time
    }

    /// Prepend a log entry, keeping at most `capacity` entries.
    pub fn push_log(&mut self, entry: LogEntry, capacity: usize) {
        self.recent_log.insert(0, entry);
        self.recent_log.truncate(capacity);
    }

    /// Time of the most recent request.
    pub fn last_seen(&self) -> Option<Timestamp> {
        self.recent_log.first().map(|e| e.ts)
    }

    /// Member's own value for tag `id`.
    pub fn tag_value(&self, id: u32) -> Option<u32> {
        self.tags.iter().find(|t| t.0 == id).map(|t| t.1)
    }

    /// Whether `identity` matches the pinned fingerprint (or none is pinned).
    pub fn identity_matches(&self, identity: &Identity) -> bool {
        match &self.identity {
            Some(pinned) => *pinned == identity.fingerprint(),
            None => true,
        }
    }
}

/// Partial update applied by the admin surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberUpdate {
    /// Authorize or deauthorize
    pub authorized: Option<bool>,
    /// Bridge flag
    pub active_bridge: Option<bool>,
    /// Replacement address list
    pub ip_assignments: Option<Vec<IpAddr>>,
    /// Replacement tags
    pub tags: Option<Vec<MemberTag>>,
    /// Replacement capability grants
    pub capabilities: Option<Vec<u32>>,
    /// Auto-assignment opt-out
    pub no_auto_assign_ips: Option<bool>,
}

impl MemberUpdate {
    /// Apply every present field. Authorization changes stamp their times.
    pub fn apply(self, member: &mut Member, now: Timestamp) {
        match self.authorized {
            Some(true) if !member.authorized => member.authorize(now, AUTHORIZED_BY_ADMIN),
            Some(false) if member.authorized => member.deauthorize(now),
            _ => {}
        }
        if let Some(v) = self.active_bridge {
            member.active_bridge = v;
        }
        if let Some(v) = self.ip_assignments {
            member.ip_assignments = v;
        }
        if let Some(v) = self.tags {
            member.tags = v;
        }
        if let Some(v) = self.capabilities {
            member.capabilities = v;
        }
        if let Some(v) = self.no_auto_assign_ips {
            member.no_auto_assign_ips = v;
        }
    }
}
