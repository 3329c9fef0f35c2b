//! # Domain Module
//!
//! Records, identifiers and the pure parts of the decision engine
//! (aggregation, address assignment, config synthesis).

pub mod aggregate;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod ip_assignment;
pub mod member;
pub mod network;
pub mod network_config;
pub mod rules;
pub mod value_objects;

pub use aggregate::*;
pub use config::*;
pub use diagnostics::*;
pub use errors::*;
pub use ip_assignment::*;
pub use member::*;
pub use network::*;
pub use network_config::*;
pub use rules::*;
pub use value_objects::*;
