//! # Record Store Adapters
//!
//! - `InMemoryNetworkStore` - tests, fault injection
//! - `JsonDirectoryStore` - one JSON file per record

pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirectoryStore;
pub use memory::InMemoryNetworkStore;
