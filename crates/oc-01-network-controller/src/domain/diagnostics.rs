//! # Circuit Test Diagnostics
//!
//! Reports sent back by nodes participating in a path test.

use super::value_objects::{NetworkId, NodeAddress, Timestamp};
use serde::{Deserialize, Serialize};

/// One hop's report for a registered circuit test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitTestReport {
    /// Test the report belongs to
    pub test_id: u64,
    /// Reporting node
    pub reporter: NodeAddress,
    /// Node the test packet came from
    pub upstream: Option<NodeAddress>,
    /// Reporter's clock
    pub timestamp: Timestamp,
    /// Reporter-side error code, `0` on success
    #[serde(default)]
    pub error_code: u32,
}

/// A registered circuit test and the reports collected so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitTest {
    /// Test id
    pub test_id: u64,
    /// Network under test
    pub network_id: NetworkId,
    /// Registration time, used for expiry
    pub registered_at: Timestamp,
    /// Reports in arrival order
    pub reports: Vec<CircuitTestReport>,
}

impl CircuitTest {
    /// A freshly registered test with no reports.
    pub fn new(test_id: u64, network_id: NetworkId, registered_at: Timestamp) -> Self {
        Self {
            test_id,
            network_id,
            registered_at,
            reports: Vec::new(),
        }
    }

    /// Whether the test outlived `ttl` at `now`.
    pub fn is_expired(&self, now: Timestamp, ttl: u64) -> bool {
        now.saturating_sub(self.registered_at) > ttl
    }
}
