//! # Network Record
//!
//! Persistent definition of one virtual network.

use super::errors::{ControllerError, StoreError};
use super::rules::{default_rule_set, Rule, MAX_RULES};
use super::value_objects::{IpPrefix, NetworkId, NodeAddress, Timestamp};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Current on-disk schema version for network records.
pub const NETWORK_SCHEMA_VERSION: u32 = 4;

/// Maximum capability definitions per network.
pub const MAX_CAPABILITIES: usize = 128;

/// Maximum tag definitions per network.
pub const MAX_TAGS: usize = 128;

/// Default multicast recipient limit.
pub const DEFAULT_MULTICAST_LIMIT: u32 = 32;

/// A virtual network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    /// Network id, immutable once created
    pub id: NetworkId,
    /// Private networks require explicit authorization
    pub private: bool,
    /// Human readable name
    pub name: String,
    /// Creation time
    pub creation_time: Timestamp,
    /// Bumped on every change
    pub revision: u64,
    /// Multicast recipient limit
    pub multicast_limit: u32,
    /// Allow broadcast frames
    pub enable_broadcast: bool,
    /// IPv4 auto-assignment
    pub v4_assign_mode: V4AssignMode,
    /// IPv6 auto-assignment
    pub v6_assign_mode: V6AssignMode,
    /// Managed address pools
    pub ip_assignment_pools: Vec<IpAssignmentPool>,
    /// Managed routes
    pub routes: Vec<Route>,
    /// Statically designated bridges
    pub active_bridges: Vec<NodeAddress>,
    /// Tokens that authorize a node on contact
    pub auth_tokens: Vec<AuthToken>,
    /// Capability definitions
    pub capabilities: Vec<CapabilityDefinition>,
    /// Tag definitions
    pub tags: Vec<TagDefinition>,
    /// Base rule set
    pub rules: Vec<Rule>,
    /// Schema version of the stored record
    pub schema_version: u32,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            id: NetworkId::default(),
            private: true,
            name: String::new(),
            creation_time: 0,
            revision: 0,
            multicast_limit: DEFAULT_MULTICAST_LIMIT,
            enable_broadcast: true,
            v4_assign_mode: V4AssignMode::default(),
            v6_assign_mode: V6AssignMode::default(),
            ip_assignment_pools: Vec::new(),
            routes: Vec::new(),
            active_bridges: Vec::new(),
            auth_tokens: Vec::new(),
            capabilities: Vec::new(),
            tags: Vec::new(),
            rules: default_rule_set(),
            schema_version: NETWORK_SCHEMA_VERSION,
        }
    }
}

/// IPv4 auto-assignment mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct V4AssignMode {
    /// Assign from IPv4 pools
    pub zt: bool,
}

/// IPv6 auto-assignment modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct V6AssignMode {
    /// Derived RFC 4193 unique local address
    pub rfc4193: bool,
    /// Assign from IPv6 pools
    pub zt: bool,
    /// Derived 6plane address
    #[serde(rename = "6plane")]
    pub six_plane: bool,
}

/// Inclusive address range used for pool assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAssignmentPool {
    /// First address
    pub ip_range_start: IpAddr,
    /// Last address
    pub ip_range_end: IpAddr,
}

impl IpAssignmentPool {
    /// Create a pool.
    pub fn new(start: IpAddr, end: IpAddr) -> Self {
        Self {
            ip_range_start: start,
            ip_range_end: end,
        }
    }

    /// Whether this is an IPv4 pool.
    pub fn is_v4(&self) -> bool {
        self.ip_range_start.is_ipv4()
    }

    /// Number of addresses, `None` when the range is malformed.
    pub fn size(&self) -> Option<u128> {
        let (start, end) = self.bounds()?;
        end.checked_sub(start)?.checked_add(1)
    }

    /// Address at `offset` from the start.
    pub fn nth(&self, offset: u128) -> Option<IpAddr> {
        let (start, end) = self.bounds()?;
        let raw = start.checked_add(offset)?;
        if raw > end {
            return None;
        }
        Some(match self.ip_range_start {
            IpAddr::V4(_) => IpAddr::V4((raw as u32).into()),
            IpAddr::V6(_) => IpAddr::V6(raw.into()),
        })
    }

    /// Whether `ip` lies in the range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.bounds(), ip_as_u128(ip)) {
            (Some((start, end)), raw) => ip.is_ipv4() == self.is_v4() && raw >= start && raw <= end,
            _ => false,
        }
    }

    fn bounds(&self) -> Option<(u128, u128)> {
        if self.ip_range_start.is_ipv4() != self.ip_range_end.is_ipv4() {
            return None;
        }
        Some((
            ip_as_u128(&self.ip_range_start),
            ip_as_u128(&self.ip_range_end),
        ))
    }
}

fn ip_as_u128(ip: &IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

/// Managed route pushed to members.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Destination prefix
    pub target: IpPrefix,
    /// Gateway, `None` for on-link
    #[serde(default)]
    pub via: Option<IpAddr>,
}

/// Token that authorizes a node presenting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque token
    pub token: String,
    /// Expiry time, `0` never expires
    #[serde(default)]
    pub expires: Timestamp,
}

impl AuthToken {
    /// Whether the token is usable at `now`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.expires == 0 || now < self.expires
    }
}

/// Capability: a named rule bundle granted to members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    /// Capability id
    pub id: u32,
    /// Rules carried by the capability
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Granted to every member
    #[serde(default)]
    pub default: bool,
}

/// Tag definition with an optional default value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDefinition {
    /// Tag id
    pub id: u32,
    /// Value for members that do not set the tag
    #[serde(default)]
    pub default: Option<u32>,
}

impl Network {
    /// Create a network record with defaults.
    pub fn new(id: NetworkId, name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            creation_time: now,
            ..Default::default()
        }
    }

    /// Storage key used in error reports.
    pub fn storage_key(id: NetworkId) -> String {
        format!("network/{}", id)
    }

    /// Normalize a record read from (or about to be written to) the store.
    ///
    /// A record naming a network id other than its storage key is corrupt.
    pub fn canonicalize(&mut self, id: NetworkId, now: Timestamp) -> Result<(), StoreError> {
        if self.id != NetworkId::default() && self.id != id {
            return Err(StoreError::Corrupt {
                key: Self::storage_key(id),
                reason: format!("record names network {}", self.id),
            });
        }
        self.id = id;
        if self.creation_time == 0 {
            self.creation_time = now;
        }
        if self.rules.is_empty() {
            self.rules = default_rule_set();
        }
        self.active_bridges.sort_unstable();
        self.active_bridges.dedup();
        if self.schema_version < NETWORK_SCHEMA_VERSION {
            self.schema_version = NETWORK_SCHEMA_VERSION;
        }
        Ok(())
    }

    /// Reject administrative input that breaks record limits.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.rules.len() > MAX_RULES {
            return Err(invalid(format!(
                "{} rules exceeds limit {}",
                self.rules.len(),
                MAX_RULES
            )));
        }
        if self.capabilities.len() > MAX_CAPABILITIES {
            return Err(invalid(format!(
                "{} capabilities exceeds limit {}",
                self.capabilities.len(),
                MAX_CAPABILITIES
            )));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(invalid(format!(
                "{} tags exceeds limit {}",
                self.tags.len(),
                MAX_TAGS
            )));
        }
        for cap in &self.capabilities {
            if cap.rules.len() > MAX_RULES {
                return Err(invalid(format!("capability {} has too many rules", cap.id)));
            }
        }
        if has_duplicates(self.capabilities.iter().map(|c| c.id)) {
            return Err(invalid("duplicate capability id".to_string()));
        }
        if has_duplicates(self.tags.iter().map(|t| t.id)) {
            return Err(invalid("duplicate tag id".to_string()));
        }
        for pool in &self.ip_assignment_pools {
            if pool.size().is_none() {
                return Err(invalid(format!(
                    "malformed pool {}-{}",
                    pool.ip_range_start, pool.ip_range_end
                )));
            }
        }
        Ok(())
    }

    /// Capability definition by id.
    pub fn capability(&self, id: u32) -> Option<&CapabilityDefinition> {
        self.capabilities.iter().find(|c| c.id == id)
    }

    /// Whether `token` matches a live auth token.
    pub fn accepts_token(&self, token: &str, now: Timestamp) -> bool {
        self.auth_tokens
            .iter()
            .any(|t| t.token == token && t.is_live(now))
    }

    /// Prefix length of the first managed route containing `ip`.
    pub fn route_prefix_for(&self, ip: &IpAddr) -> Option<u8> {
        self.routes
            .iter()
            .find(|r| r.target.contains(ip))
            .map(|r| r.target.bits)
    }
}

fn invalid(reason: String) -> ControllerError {
    ControllerError::InvalidRecord(reason)
}

fn has_duplicates(ids: impl Iterator<Item = u32>) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

/// Partial update applied by the admin surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkUpdate {
    /// New name
    pub name: Option<String>,
    /// New privacy flag
    pub private: Option<bool>,
    /// New multicast limit
    pub multicast_limit: Option<u32>,
    /// New broadcast flag
    pub enable_broadcast: Option<bool>,
    /// New IPv4 assignment mode
    pub v4_assign_mode: Option<V4AssignMode>,
    /// New IPv6 assignment mode
    pub v6_assign_mode: Option<V6AssignMode>,
    /// Replacement pools
    pub ip_assignment_pools: Option<Vec<IpAssignmentPool>>,
    /// Replacement routes
    pub routes: Option<Vec<Route>>,
    /// Replacement bridge list
    pub active_bridges: Option<Vec<NodeAddress>>,
    /// Replacement auth tokens
    pub auth_tokens: Option<Vec<AuthToken>>,
    /// Replacement capabilities
    pub capabilities: Option<Vec<CapabilityDefinition>>,
    /// Replacement tags
    pub tags: Option<Vec<TagDefinition>>,
    /// Replacement rule set
    pub rules: Option<Vec<Rule>>,
}

impl NetworkUpdate {
    /// Apply every present field to `network`.
    pub fn apply(self, network: &mut Network) {
        if let Some(v) = self.name {
            network.name = v;
        }
        if let Some(v) = self.private {
            network.private = v;
        }
        if let Some(v) = self.multicast_limit {
            network.multicast_limit = v;
        }
        if let Some(v) = self.enable_broadcast {
            network.enable_broadcast = v;
        }
        if let Some(v) = self.v4_assign_mode {
            network.v4_assign_mode = v;
        }
        if let Some(v) = self.v6_assign_mode {
            network.v6_assign_mode = v;
        }
        if let Some(v) = self.ip_assignment_pools {
            network.ip_assignment_pools = v;
        }
        if let Some(v) = self.routes {
            network.routes = v;
        }
        if let Some(v) = self.active_bridges {
            network.active_bridges = v;
        }
        if let Some(v) = self.auth_tokens {
            network.auth_tokens = v;
        }
        if let Some(v) = self.capabilities {
            network.capabilities = v;
        }
        if let Some(v) = self.tags {
            network.tags = v;
        }
        if let Some(v) = self.rules {
            network.rules = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nwid() -> NetworkId {
        NetworkId(0x8056c2e21c000001)
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let net: Network = serde_json::from_str(r#"{"name": "lab"}"#).unwrap();
        assert!(net.private);
        assert_eq!(net.multicast_limit, DEFAULT_MULTICAST_LIMIT);
        assert!(net.enable_broadcast);
        assert_eq!(net.rules, default_rule_set());
    }

    #[test]
    fn test_assign_mode_wire_names() {
        let net: Network = serde_json::from_str(
            r#"{"v6AssignMode": {"rfc4193": true, "6plane": true}, "v4AssignMode": {"zt": true}}"#,
        )
        .unwrap();
        assert!(net.v6_assign_mode.rfc4193);
        assert!(net.v6_assign_mode.six_plane);
        assert!(!net.v6_assign_mode.zt);
        assert!(net.v4_assign_mode.zt);
    }

    #[test]
    fn test_canonicalize_stamps_id_and_rules() {
        let mut net: Network = serde_json::from_str(r#"{"rules": []}"#).unwrap();
        net.canonicalize(nwid(), 1_000).unwrap();
        assert_eq!(net.id, nwid());
        assert_eq!(net.creation_time, 1_000);
        assert_eq!(net.rules, default_rule_set());
    }

    #[test]
    fn test_canonicalize_rejects_foreign_id() {
        let mut net = Network::new(NetworkId(42), "x", 1);
        let err = net.canonicalize(nwid(), 1).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_validate_caps() {
        let mut net = Network::new(nwid(), "big", 1);
        net.rules = vec![Rule::accept(); MAX_RULES + 1];
        assert!(matches!(
            net.validate(),
            Err(ControllerError::InvalidRecord(_))
        ));

        net.rules = default_rule_set();
        net.tags = (0..=MAX_TAGS as u32)
            .map(|id| TagDefinition { id, default: None })
            .collect();
        assert!(net.validate().is_err());

        net.tags.truncate(2);
        assert!(net.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mixed_family_pool() {
        let mut net = Network::new(nwid(), "x", 1);
        net.ip_assignment_pools.push(IpAssignmentPool::new(
            "10.0.0.1".parse().unwrap(),
            "fd00::1".parse().unwrap(),
        ));
        assert!(net.validate().is_err());
    }

    #[test]
    fn test_pool_size_and_nth() {
        let pool = IpAssignmentPool::new("10.0.0.1".parse().unwrap(), "10.0.0.10".parse().unwrap());
        assert_eq!(pool.size(), Some(10));
        assert_eq!(pool.nth(9), Some("10.0.0.10".parse().unwrap()));
        assert_eq!(pool.nth(10), None);
        assert!(pool.contains(&"10.0.0.5".parse().unwrap()));
        assert!(!pool.contains(&"10.0.0.11".parse().unwrap()));

        let backwards =
            IpAssignmentPool::new("10.0.0.9".parse().unwrap(), "10.0.0.1".parse().unwrap());
        assert_eq!(backwards.size(), None);
    }

    #[test]
    fn test_auth_token_expiry() {
        let mut net = Network::new(nwid(), "x", 1);
        net.auth_tokens.push(AuthToken {
            token: "forever".to_string(),
            expires: 0,
        });
        net.auth_tokens.push(AuthToken {
            token: "brief".to_string(),
            expires: 5_000,
        });
        assert!(net.accepts_token("forever", u64::MAX));
        assert!(net.accepts_token("brief", 4_999));
        assert!(!net.accepts_token("brief", 5_000));
        assert!(!net.accepts_token("other", 0));
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut net = Network::new(nwid(), "old", 1);
        NetworkUpdate {
            private: Some(false),
            ..Default::default()
        }
        .apply(&mut net);
        assert!(!net.private);
        assert_eq!(net.name, "old");
    }
}
