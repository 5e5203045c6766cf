//! # Event Broker Test Suite
//!
//! Unified test crate for scenarios that span crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs             # SSE reader, broker fixtures
//! └── integration/
//!     ├── end_to_end.rs      # Subscribe, replay, filter, admission cap
//!     ├── backpressure.rs    # Global vs per-client drops, heartbeats
//!     └── service_tcp.rs     # Full service over real sockets
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p broker-tests
//! cargo test -p broker-tests integration::backpressure::
//!
//! # Benchmarks
//! cargo bench -p broker-tests
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
