//! # Value Objects
//!
//! Identifiers, identities and address prefixes.

use super::errors::ParseIdError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Largest valid node address (40 bits).
pub const MAX_NODE_ADDRESS: u64 = 0xff_ffff_ffff;

/// 64-bit network identifier.
///
/// The top 40 bits name the controller that owns the network, the low 24
/// bits are a per-controller suffix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(pub u64);

impl NetworkId {
    /// Build a network id owned by `controller`.
    pub fn for_controller(controller: NodeAddress, suffix: u32) -> Self {
        Self((controller.0 << 24) | u64::from(suffix & 0x00ff_ffff))
    }

    /// Address of the owning controller.
    pub fn controller(&self) -> NodeAddress {
        NodeAddress(self.0 >> 24)
    }

    /// Low 24 bits.
    pub fn suffix(&self) -> u32 {
        (self.0 & 0x00ff_ffff) as u32
    }

    /// Big-endian bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 {
            return Err(ParseIdError::InvalidHex(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(NetworkId)
            .map_err(|_| ParseIdError::InvalidHex(s.to_string()))
    }
}

impl Serialize for NetworkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 40-bit node address.
///
/// `Default` yields the reserved zero address, used only as a placeholder
/// until canonicalization stamps the real one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddress(pub u64);

impl NodeAddress {
    /// Validate and wrap a raw address.
    pub fn new(raw: u64) -> Result<Self, ParseIdError> {
        if raw > MAX_NODE_ADDRESS {
            return Err(ParseIdError::AddressOutOfRange(raw));
        }
        if raw == 0 {
            return Err(ParseIdError::ReservedAddress);
        }
        Ok(Self(raw))
    }

    /// Big-endian 5-byte encoding.
    pub fn to_bytes(&self) -> [u8; 5] {
        let b = self.0.to_be_bytes();
        [b[3], b[4], b[5], b[6], b[7]]
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010x}", self.0)
    }
}

impl FromStr for NodeAddress {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 10 {
            return Err(ParseIdError::InvalidHex(s.to_string()));
        }
        let raw =
            u64::from_str_radix(s, 16).map_err(|_| ParseIdError::InvalidHex(s.to_string()))?;
        NodeAddress::new(raw)
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(NodeAddress::default());
        }
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Node identity: address plus public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Node address
    pub address: NodeAddress,
    /// Raw public key bytes
    pub public_key: Vec<u8>,
}

impl Identity {
    /// Create an identity.
    pub fn new(address: NodeAddress, public_key: Vec<u8>) -> Self {
        Self {
            address,
            public_key,
        }
    }

    /// Hex of the public key, pinned on first contact.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.public_key)
    }
}

/// An `ip/bits` prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpPrefix {
    /// Address part
    pub addr: IpAddr,
    /// Prefix length
    pub bits: u8,
}

impl IpPrefix {
    /// Create a prefix, rejecting lengths beyond the family width.
    pub fn new(addr: IpAddr, bits: u8) -> Result<Self, ParseIdError> {
        if bits > max_bits(&addr) {
            return Err(ParseIdError::InvalidPrefix(format!("{}/{}", addr, bits)));
        }
        Ok(Self { addr, bits })
    }

    /// Host prefix (`/32` or `/128`).
    pub fn host(addr: IpAddr) -> Self {
        Self {
            addr,
            bits: max_bits(&addr),
        }
    }

    /// Whether `ip` falls inside this prefix.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask(self.bits, 32) as u32;
                (u32::from(net) & mask) == (u32::from(*ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask(self.bits, 128);
                (u128::from(net) & mask) == (u128::from(*ip) & mask)
            }
            _ => false,
        }
    }
}

fn max_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn prefix_mask(bits: u8, width: u32) -> u128 {
    if bits == 0 {
        return 0;
    }
    let full = if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    if u32::from(bits) >= width {
        return full;
    }
    full & !(full >> u32::from(bits))
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.bits)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, bits) = s
            .split_once('/')
            .ok_or_else(|| ParseIdError::InvalidPrefix(s.to_string()))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| ParseIdError::InvalidPrefix(s.to_string()))?;
        let bits: u8 = bits
            .parse()
            .map_err(|_| ParseIdError::InvalidPrefix(s.to_string()))?;
        IpPrefix::new(addr, bits)
    }
}

impl Serialize for IpPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Metadata a node attaches to its configuration request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Node protocol version
    pub protocol_version: u32,
    /// Software major version
    pub version_major: u32,
    /// Software minor version
    pub version_minor: u32,
    /// Software revision
    pub version_revision: u32,
    /// Optional network auth token
    pub auth_token: Option<String>,
}
