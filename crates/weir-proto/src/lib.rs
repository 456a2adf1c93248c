//! Weir Proto - data model and wire protocol for the weir overlay.
//!
//! This crate defines:
//! - The immutable Merkle DAG node model (`DagNode`, `DagLink`, `NodeData`)
//! - Signed records (`Record`)
//! - The six DHT RPC message kinds and their length-prefixed codec

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod dag;
pub mod messages;
pub mod record;

pub use dag::{DagLink, DagNode, DataKind, NodeData};
pub use messages::{DhtMessage, MessageCodec, MessageKind, PeerEntry};
pub use record::Record;
