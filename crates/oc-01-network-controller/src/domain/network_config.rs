//! # Network Configuration
//!
//! The configuration handed to an authorized member, synthesized from the
//! network record, the member record and the membership aggregate.

use super::aggregate::AggregateInfo;
use super::ip_assignment::{derived_addresses, is_derived_layout};
use super::member::{Member, MemberTag};
use super::network::{CapabilityDefinition, Network, Route};
use super::rules::Rule;
use super::value_objects::{IpPrefix, NetworkId, NodeAddress, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration sent to a member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Network id
    pub network_id: NetworkId,
    /// Controller clock at issue time
    pub timestamp: Timestamp,
    /// Maximum accepted age difference between peer credentials
    pub credential_time_max_delta: u64,
    /// Network revision
    pub revision: u64,
    /// Member the config was issued to
    pub issued_to: NodeAddress,
    /// Issuing controller
    pub issued_by: NodeAddress,
    /// Network name
    pub name: String,
    /// Privacy flag
    pub private: bool,
    /// Multicast recipient limit
    pub multicast_limit: u32,
    /// Broadcast flag
    pub enable_broadcast: bool,
    /// Base rule set
    pub rules: Vec<Rule>,
    /// Capabilities granted to the member
    pub capabilities: Vec<CapabilityDefinition>,
    /// Effective tag values, sorted by id
    pub tags: Vec<MemberTag>,
    /// Member addresses with prefix lengths
    pub static_ips: Vec<IpPrefix>,
    /// Managed routes
    pub routes: Vec<Route>,
    /// Bridges on the network
    pub active_bridges: Vec<NodeAddress>,
}

/// Credential time delta: narrowed to the age of a recent deauthorization.
pub fn credential_time_max_delta(
    most_recent_deauth_time: Timestamp,
    now: Timestamp,
    default_delta: u64,
) -> u64 {
    if most_recent_deauth_time == 0 {
        return default_delta;
    }
    let since = now.saturating_sub(most_recent_deauth_time);
    since.min(default_delta)
}

/// Build the configuration for `member`.
pub fn synthesize(
    network: &Network,
    member: &Member,
    aggregate: &AggregateInfo,
    now: Timestamp,
    default_delta: u64,
) -> NetworkConfig {
    let capabilities = network
        .capabilities
        .iter()
        .filter(|cap| cap.default || member.capabilities.contains(&cap.id))
        .cloned()
        .collect();

    let mut tags: BTreeMap<u32, u32> = network
        .tags
        .iter()
        .filter_map(|t| t.default.map(|v| (t.id, v)))
        .collect();
    for tag in &member.tags {
        tags.insert(tag.0, tag.1);
    }

    // Derived layouts left in older records are dropped and recomputed.
    let mut static_ips: Vec<IpPrefix> = member
        .ip_assignments
        .iter()
        .filter(|ip| !is_derived_layout(ip, network.id))
        .map(|ip| match network.route_prefix_for(ip) {
            Some(bits) => IpPrefix { addr: *ip, bits },
            None => IpPrefix::host(*ip),
        })
        .collect();
    if !member.no_auto_assign_ips {
        static_ips.extend(derived_addresses(network, member.address));
    }

    let mut bridges = aggregate.active_bridges.clone();
    bridges.extend(network.active_bridges.iter().copied());

    NetworkConfig {
        network_id: network.id,
        timestamp: now,
        credential_time_max_delta: credential_time_max_delta(
            aggregate.most_recent_deauth_time,
            now,
            default_delta,
        ),
        revision: network.revision,
        issued_to: member.address,
        issued_by: network.id.controller(),
        name: network.name.clone(),
        private: network.private,
        multicast_limit: network.multicast_limit,
        enable_broadcast: network.enable_broadcast,
        rules: network.rules.clone(),
        capabilities,
        tags: tags.into_iter().map(|(id, v)| MemberTag(id, v)).collect(),
        static_ips,
        routes: network.routes.clone(),
        active_bridges: bridges.into_iter().collect(),
    }
}
