//! # Request Rate Limiter
//!
//! Per `(network, requester)` minimum spacing between accepted
//! configuration requests. Rejected requests do not advance the clock, so a
//! node hammering the controller is released exactly `min_interval_ms`
//! after its last accepted request.

use crate::domain::{NetworkId, NodeAddress, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Sharded last-accepted-request table.
#[derive(Debug)]
pub struct RequestRateLimiter {
    last_request: DashMap<(NetworkId, NodeAddress), Timestamp>,
    min_interval_ms: u64,
}

impl RequestRateLimiter {
    /// Limiter with the given spacing. `0` accepts everything.
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: DashMap::new(),
            min_interval_ms,
        }
    }

    /// Configured spacing.
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Atomically check and record a request.
    pub fn should_accept(&self, nwid: NetworkId, requester: NodeAddress, now: Timestamp) -> bool {
        if self.min_interval_ms == 0 {
            return true;
        }
        match self.last_request.entry((nwid, requester)) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                let last = *slot.get();
                // A clock that went backwards stays limited until it catches up.
                if now < last.saturating_add(self.min_interval_ms) {
                    return false;
                }
                slot.insert(now);
                true
            }
        }
    }

    /// Milliseconds until `requester` would be accepted, `0` if now.
    pub fn retry_after(&self, nwid: NetworkId, requester: NodeAddress, now: Timestamp) -> u64 {
        if self.min_interval_ms == 0 {
            return 0;
        }
        self.last_request
            .get(&(nwid, requester))
            .map(|last| last.saturating_add(self.min_interval_ms).saturating_sub(now))
            .unwrap_or(0)
    }

    /// Forget requesters idle for longer than `max_age`. Returns how many.
    pub fn purge(&self, now: Timestamp, max_age: u64) -> usize {
        let before = self.last_request.len();
        self.last_request
            .retain(|_, last| now.saturating_sub(*last) <= max_age);
        let purged = before.saturating_sub(self.last_request.len());
        if purged > 0 {
            debug!(purged, "[oc-01] Purged idle rate-limit entries");
        }
        purged
    }

    /// Number of tracked requesters.
    pub fn len(&self) -> usize {
        self.last_request.len()
    }

    /// Whether no requester is tracked.
    pub fn is_empty(&self) -> bool {
        self.last_request.is_empty()
    }
}
