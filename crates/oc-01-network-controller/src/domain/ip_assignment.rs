//! # IP Auto-Assignment
//!
//! Address selection for members of networks with auto-assignment enabled.
//!
//! | Mode | Source | Prefix | Stored on the member |
//! |------|--------|--------|----------------------|
//! | v4 `zt` | IPv4 assignment pools | first containing route, else `/32` | yes |
//! | v6 `zt` | IPv6 assignment pools | first containing route, else `/128` | yes |
//! | `rfc4193` | `fd` + nwid + `9993` + address | `/88` | no |
//! | `6plane` | `fc` + folded nwid + address + `::1` | `/40` | no |
//!
//! Derived addresses are a function of (network, member) and are computed
//! per request from the network's current modes. Pool probing never hands
//! out an address in a derived layout of the same network.

use super::network::{IpAssignmentPool, Network};
use super::value_objects::{IpPrefix, NetworkId, NodeAddress};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv6Addr};

/// Prefix length of an RFC 4193 member address.
pub const RFC4193_PREFIX_BITS: u8 = 88;

/// Prefix length of a 6plane member address.
pub const SIX_PLANE_PREFIX_BITS: u8 = 40;

/// Pool-backed assignment modes, in the order they are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignMode {
    /// IPv4 pool
    V4Pool,
    /// IPv6 pool
    V6Pool,
}

impl AssignMode {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignMode::V4Pool => "v4_pool",
            AssignMode::V6Pool => "v6_pool",
        }
    }

    fn hash_tag(&self) -> u8 {
        match self {
            AssignMode::V4Pool => 4,
            AssignMode::V6Pool => 6,
        }
    }

    fn wants(&self, ip: &IpAddr) -> bool {
        match self {
            AssignMode::V4Pool => ip.is_ipv4(),
            AssignMode::V6Pool => ip.is_ipv6(),
        }
    }
}

/// An address picked for a member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// The address
    pub ip: IpAddr,
    /// Mode that produced it
    pub mode: AssignMode,
}

/// RFC 4193 address of `address` on `nwid`.
pub fn rfc4193_address(nwid: NetworkId, address: NodeAddress) -> Ipv6Addr {
    let mut b = [0u8; 16];
    b[0] = 0xfd;
    b[1..9].copy_from_slice(&nwid.to_bytes());
    b[9] = 0x99;
    b[10] = 0x93;
    b[11..16].copy_from_slice(&address.to_bytes());
    Ipv6Addr::from(b)
}

fn fold(nwid: NetworkId) -> [u8; 4] {
    (((nwid.0 >> 32) as u32) ^ (nwid.0 as u32)).to_be_bytes()
}

/// 6plane address of `address` on `nwid`.
pub fn six_plane_address(nwid: NetworkId, address: NodeAddress) -> Ipv6Addr {
    let mut b = [0u8; 16];
    b[0] = 0xfc;
    b[1..5].copy_from_slice(&fold(nwid));
    b[5..10].copy_from_slice(&address.to_bytes());
    b[15] = 0x01;
    Ipv6Addr::from(b)
}

/// Whether `ip` has the rfc4193 or 6plane layout of some member of `nwid`.
pub fn is_derived_layout(ip: &IpAddr, nwid: NetworkId) -> bool {
    let IpAddr::V6(v6) = ip else {
        return false;
    };
    let o = v6.octets();
    let rfc4193 = o[0] == 0xfd && o[1..9] == nwid.to_bytes() && o[9..11] == [0x99, 0x93];
    let six_plane = o[0] == 0xfc && o[1..5] == fold(nwid) && o[10..15] == [0u8; 5] && o[15] == 0x01;
    rfc4193 || six_plane
}

/// Derived addresses of `address` for the network's enabled derived modes.
pub fn derived_addresses(network: &Network, address: NodeAddress) -> Vec<IpPrefix> {
    let mut out = Vec::with_capacity(2);
    if network.v6_assign_mode.rfc4193 {
        out.push(IpPrefix {
            addr: IpAddr::V6(rfc4193_address(network.id, address)),
            bits: RFC4193_PREFIX_BITS,
        });
    }
    if network.v6_assign_mode.six_plane {
        out.push(IpPrefix {
            addr: IpAddr::V6(six_plane_address(network.id, address)),
            bits: SIX_PLANE_PREFIX_BITS,
        });
    }
    out
}

/// Assign a pool address for every enabled pool mode the member lacks.
///
/// New addresses are appended to `current` and inserted into `allocated`
/// before the next mode runs. Exhausted pools skip the mode.
pub fn assign_addresses(
    network: &Network,
    address: NodeAddress,
    current: &mut Vec<IpAddr>,
    allocated: &mut BTreeSet<IpAddr>,
) -> Vec<Assignment> {
    let nwid = network.id;
    let mut modes = Vec::with_capacity(2);
    if network.v4_assign_mode.zt {
        modes.push(AssignMode::V4Pool);
    }
    if network.v6_assign_mode.zt {
        modes.push(AssignMode::V6Pool);
    }

    let mut assigned = Vec::new();
    for mode in modes {
        if is_satisfied(mode, network, current) {
            continue;
        }
        let picked = network
            .ip_assignment_pools
            .iter()
            .filter(|pool| mode.wants(&pool.ip_range_start))
            .find_map(|pool| probe_pool(pool, nwid, address, mode, allocated));
        if let Some(ip) = picked {
            allocated.insert(ip);
            current.push(ip);
            assigned.push(Assignment { ip, mode });
        }
    }
    assigned
}

/// A pool mode is satisfied by any held address of its family inside a
/// pool, manual ones included. Derived layouts never count.
fn is_satisfied(mode: AssignMode, network: &Network, current: &[IpAddr]) -> bool {
    current.iter().any(|ip| {
        mode.wants(ip)
            && !is_derived_layout(ip, network.id)
            && network
                .ip_assignment_pools
                .iter()
                .any(|pool| pool.contains(ip))
    })
}

/// Starting offset of the probe sequence inside a pool.
fn pool_offset(nwid: NetworkId, address: NodeAddress, mode: AssignMode, size: u128) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(nwid.to_bytes());
    hasher.update(address.to_bytes());
    hasher.update([mode.hash_tag()]);
    let digest = hasher.finalize();
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(head) % size
}

fn probe_pool(
    pool: &IpAssignmentPool,
    nwid: NetworkId,
    address: NodeAddress,
    mode: AssignMode,
    allocated: &BTreeSet<IpAddr>,
) -> Option<IpAddr> {
    let size = pool.size()?;
    let start = pool_offset(nwid, address, mode, size);
    let budget = (allocated.len() as u128)
        .saturating_add(1)
        .saturating_mul(2)
        .saturating_add(2)
        .min(size);

    for i in 0..budget {
        let remaining = size - start;
        let offset = if i < remaining { start + i } else { i - remaining };
        let candidate = pool.nth(offset)?;
        if let IpAddr::V4(v4) = candidate {
            let last = v4.octets()[3];
            if last == 0 || last == 255 {
                continue;
            }
        }
        if is_derived_layout(&candidate, nwid) {
            continue;
        }
        if !allocated.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}
