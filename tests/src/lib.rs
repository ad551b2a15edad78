//! # Fieldlink Test Suite
//!
//! Multi-node scenarios that run whole adapters against each other over
//! the in-memory transport.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Three-node topology and device handlers
//! └── integration/      # End-to-end scenarios
//!     ├── scenarios.rs  # Timeouts, concurrency, malformed frames
//!     ├── signatures.rs # Signing and verification across hops
//!     └── forwarding.rs # Relay policy and filters
//! ```
//!
//! ## Topology
//!
//! ```text
//!   csms  <──uplink──>  relay  <──downlink──>  cp-1
//! ```
//!
//! The CSMS reaches `cp-1` through the relay; the device's default route
//! points at the relay.
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fl-tests
//!
//! # By category
//! cargo test -p fl-tests integration::signatures::
//! ```

pub mod fixtures;
pub mod integration;
