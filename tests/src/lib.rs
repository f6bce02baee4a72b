//! # Topic-Chain Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # Operators, drivers and fast driver settings
//! └── integration/
//!     ├── lifecycle_flows.rs   # Create → publish → delete scenarios
//!     ├── delivery_flows.rs    # Subscription delivery end to end
//!     └── failure_injection.rs # Faulty ledger clients behind the port
//!
//! tests/benches/
//! └── lifecycle_benchmarks.rs  # Chunking, running hash, signing
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p topic-tests
//!
//! # By category
//! cargo test -p topic-tests integration::delivery_flows
//!
//! # Benchmarks
//! cargo bench -p topic-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
