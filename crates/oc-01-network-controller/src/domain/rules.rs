//! # Traffic Rules
//!
//! Rules are stored and forwarded to members verbatim. The controller never
//! evaluates them.

use super::value_objects::{IpPrefix, NodeAddress};
use serde::{Deserialize, Serialize};

/// Maximum number of rules in a network's rule set.
pub const MAX_RULES: usize = 1024;

/// A single rule entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Invert the match
    #[serde(default)]
    pub not: bool,
    /// OR with the previous match instead of AND
    #[serde(default)]
    pub or: bool,
    /// Action or match
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl Rule {
    /// Plain rule with no modifiers.
    pub fn new(kind: RuleKind) -> Self {
        Self {
            not: false,
            or: false,
            kind,
        }
    }

    /// `ACTION_ACCEPT`.
    pub fn accept() -> Self {
        Self::new(RuleKind::ActionAccept)
    }

    /// Whether this entry terminates a rule chain.
    pub fn is_action(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::ActionAccept
                | RuleKind::ActionDrop
                | RuleKind::ActionBreak
                | RuleKind::ActionTee { .. }
                | RuleKind::ActionWatch { .. }
                | RuleKind::ActionRedirect { .. }
        )
    }
}

/// Rule kinds, serialized as `{"type": "ACTION_ACCEPT", ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    /// Accept and stop
    ActionAccept,
    /// Drop and stop
    ActionDrop,
    /// Stop evaluating this chain
    ActionBreak,
    /// Copy to `address`
    ActionTee {
        /// Observer node
        address: NodeAddress,
        /// Bytes to copy (0 = whole frame)
        #[serde(default)]
        length: u32,
    },
    /// Copy to `address` with delivery notice
    ActionWatch {
        /// Observer node
        address: NodeAddress,
        /// Bytes to copy (0 = whole frame)
        #[serde(default)]
        length: u32,
    },
    /// Send to `address` instead
    ActionRedirect {
        /// Redirect target
        address: NodeAddress,
    },
    /// Match the sending node
    MatchSourceNodeAddress {
        /// Node address
        address: NodeAddress,
    },
    /// Match the receiving node
    MatchDestNodeAddress {
        /// Node address
        address: NodeAddress,
    },
    /// Match the Ethernet frame type
    MatchEthertype {
        /// Ethertype
        #[serde(rename = "etherType")]
        ether_type: u16,
    },
    /// Match the IP protocol number
    MatchIpProtocol {
        /// Protocol number
        #[serde(rename = "ipProtocol")]
        ip_protocol: u8,
    },
    /// Match IPv4 source prefix
    MatchIpv4Source {
        /// Prefix
        ip: IpPrefix,
    },
    /// Match IPv4 destination prefix
    MatchIpv4Dest {
        /// Prefix
        ip: IpPrefix,
    },
    /// Match IPv6 source prefix
    MatchIpv6Source {
        /// Prefix
        ip: IpPrefix,
    },
    /// Match IPv6 destination prefix
    MatchIpv6Dest {
        /// Prefix
        ip: IpPrefix,
    },
    /// Match when the tag values of both peers differ by at most `value`
    MatchTagsDifference {
        /// Tag id
        id: u32,
        /// Threshold
        value: u32,
    },
    /// Match when both peers carry tag `id` equal to `value`
    MatchTagsEqual {
        /// Tag id
        id: u32,
        /// Value
        value: u32,
    },
}

/// Rule set installed when a network defines none: accept everything.
pub fn default_rule_set() -> Vec<Rule> {
    vec![Rule::accept()]
}
