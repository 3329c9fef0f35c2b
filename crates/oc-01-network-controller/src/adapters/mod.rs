//! # Adapters Layer
//!
//! - `store` - record stores (in-memory, JSON directory)
//! - `time` - system and manual clocks
//! - `diagnostics` - circuit test report channel and collector

pub mod diagnostics;
pub mod store;
pub mod time;

pub use diagnostics::{diagnostics_channel, DiagnosticsCollector, DiagnosticsSink};
pub use store::{InMemoryNetworkStore, JsonDirectoryStore};
pub use time::{ManualTimeSource, SystemTimeSource};
