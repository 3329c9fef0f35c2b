//! # Overlay-Controller Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Decision engine throughput
//! └── src/integration/  # Service + store flows
//!     ├── fixtures.rs         # Shared harness
//!     ├── decision_flows.rs   # Admission, deauthorization, tokens
//!     ├── json_store.rs       # On-disk records, restarts, hand edits
//!     └── concurrency.rs      # Parallel requests, maintenance task
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p oc-tests
//! cargo test -p oc-tests integration::json_store::
//!
//! # Benchmarks
//! cargo bench -p oc-tests
//! ```

pub mod integration;
