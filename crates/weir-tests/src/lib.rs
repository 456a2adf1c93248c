//! Weir Tests - multi-node harness for integration testing.

#![deny(unsafe_code)]

pub mod harness;
pub mod node;

pub use harness::TestNetwork;
pub use node::TestNode;
