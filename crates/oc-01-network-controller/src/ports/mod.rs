//! # Ports Layer
//!
//! - `inbound.rs` - Driving ports (decision entry point, admin surface)
//! - `outbound.rs` - Driven ports (record store, clock)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
