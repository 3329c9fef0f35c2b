//! # Membership Aggregation
//!
//! Network-wide facts derived from a member snapshot. Computed per decision,
//! never cached.

use super::member::Member;
use super::value_objects::{NodeAddress, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Aggregate view of one network's membership.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregateInfo {
    /// Members flagged as active bridges
    pub active_bridges: BTreeSet<NodeAddress>,
    /// Every address assigned to any member
    pub allocated_ips: BTreeSet<IpAddr>,
    /// Authorized members
    pub authorized_member_count: usize,
    /// Members seen within the liveness window
    pub active_member_count: usize,
    /// All members
    pub total_member_count: usize,
    /// Latest deauthorization across the network
    pub most_recent_deauth_time: Timestamp,
}

/// Fold a member snapshot into an [`AggregateInfo`].
///
/// A member is active if its newest log entry is no older than
/// `active_window` at `now`.
pub fn aggregate<'a, I>(members: I, now: Timestamp, active_window: u64) -> AggregateInfo
where
    I: IntoIterator<Item = &'a Member>,
{
    let mut info = AggregateInfo::default();
    for member in members {
        info.total_member_count += 1;
        if member.authorized {
            info.authorized_member_count += 1;
        }
        if let Some(seen) = member.last_seen() {
            if now.saturating_sub(seen) <= active_window {
                info.active_member_count += 1;
            }
        }
        info.allocated_ips
            .extend(member.ip_assignments.iter().copied());
        if member.active_bridge {
            info.active_bridges.insert(member.address);
        }
        info.most_recent_deauth_time = info
            .most_recent_deauth_time
            .max(member.last_deauthorized_time);
    }
    info
}

/// [`aggregate`] over a cache snapshot.
pub fn aggregate_snapshot(
    snapshot: &BTreeMap<NodeAddress, Member>,
    now: Timestamp,
    active_window: u64,
) -> AggregateInfo {
    aggregate(snapshot.values(), now, active_window)
}
