//! # OC-01 Network Controller
//!
//! Membership and configuration authority for a software-defined virtual
//! network.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! For every configuration request a node sends, decide whether it may join
//! the network and, if so, what it receives: rules, addresses,
//! capabilities, tags and bridging state.
//!
//! ## Decision Pipeline
//!
//! | Step | Outcome on failure |
//! |------|--------------------|
//! | Rate check per (network, node) | `RateLimited` |
//! | Network lookup, ownership check | `NotFound` |
//! | Member lookup / first contact | `AccessDenied` on identity mismatch |
//! | Authorization gate (private, token, public) | `AccessDenied` |
//! | Aggregate, stale authorization override | `AccessDenied` |
//! | IP auto-assignment | never fails |
//! | Config synthesis, activity log, write-back | write-back failure is logged |
//!
//! ## Module Structure
//!
//! ```text
//! oc-01-network-controller/
//! ├── domain/      # Records, ids, aggregation, address assignment, synthesis
//! ├── ports/       # NetworkConfigApi, ControllerAdminApi, NetworkStore, TimeSource
//! ├── adapters/    # Stores, clocks, diagnostics channel
//! ├── cache/       # Write-through membership cache
//! ├── rate_limit   # Per-requester minimum interval
//! └── service/     # Decision engine, admin surface, maintenance
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod cache;
pub mod domain;
pub(crate) mod metrics;
pub mod ports;
pub mod rate_limit;
pub mod service;

// Re-exports
pub use adapters::{
    diagnostics_channel, DiagnosticsCollector, DiagnosticsSink, InMemoryNetworkStore,
    JsonDirectoryStore, ManualTimeSource, SystemTimeSource,
};
pub use cache::{MembershipCache, MemberSnapshot};
pub use domain::{
    aggregate, AggregateInfo, CircuitTest, CircuitTestReport, ConfigError, ControllerConfig,
    ControllerError, Identity, IpPrefix, Member, MemberUpdate, Network, NetworkConfig, NetworkId,
    NetworkUpdate, NodeAddress, RequestMetadata, ResultCode, StoreError, Timestamp,
};
pub use ports::{
    ConfigRequest, ControllerAdminApi, NetworkConfigApi, NetworkStore, NetworkSummary,
    TimeSource,
};
pub use rate_limit::RequestRateLimiter;
pub use service::{ControllerDependencies, ControllerService, MaintenanceReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
