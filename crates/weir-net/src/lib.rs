//! Weir Net - the Host collaborator seam.
//!
//! Transport, connection multiplexing and wire security live outside the
//! overlay core. This crate defines the [`Host`] interface the core talks
//! to, the address book ([`Peerstore`]), and an in-process loopback
//! implementation ([`MemNetwork`]/[`MemHost`]) that the test harness and
//! single-process deployments use.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod host;
pub mod mem;
pub mod peerstore;

pub use host::{Host, HostError, RequestHandler};
pub use mem::{MemHost, MemNetwork};
pub use peerstore::Peerstore;

use weir_core::PeerId;
use weir_proto::PeerEntry;

/// A peer and the addresses it is reachable on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Peer identifier.
    pub id: PeerId,
    /// Known multi-addresses.
    pub addrs: Vec<String>,
}

impl From<PeerEntry> for PeerInfo {
    fn from(entry: PeerEntry) -> Self {
        Self {
            id: entry.id,
            addrs: entry.addrs,
        }
    }
}

impl From<PeerInfo> for PeerEntry {
    fn from(info: PeerInfo) -> Self {
        Self {
            id: info.id,
            addrs: info.addrs,
        }
    }
}
