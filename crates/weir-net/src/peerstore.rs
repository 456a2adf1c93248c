//! Peer address book.
//!
//! The DHT stores only peer ids in its routing structures and re-queries
//! addresses from the peerstore on demand. Addresses arrive from inbound
//! connections, closer-peer entries in lookup responses, and provider
//! announcements.

use std::collections::HashMap;

use parking_lot::RwLock;
use weir_core::PeerId;

#[derive(Default)]
struct PeerRecord {
    addrs: Vec<String>,
    public_key: Option<[u8; 32]>,
}

/// Address and key book for known peers.
#[derive(Default)]
pub struct Peerstore {
    peers: RwLock<HashMap<PeerId, PeerRecord>>,
}

impl Peerstore {
    /// Creates an empty peerstore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds addresses for a peer, keeping existing ones and dropping
    /// duplicates.
    pub fn add_addrs(&self, peer: &PeerId, addrs: &[String]) {
        if addrs.is_empty() {
            return;
        }
        let mut peers = self.peers.write();
        let record = peers.entry(*peer).or_default();
        for addr in addrs {
            if !record.addrs.contains(addr) {
                record.addrs.push(addr.clone());
            }
        }
    }

    /// Returns the known addresses for a peer.
    pub fn addrs(&self, peer: &PeerId) -> Vec<String> {
        self.peers
            .read()
            .get(peer)
            .map(|r| r.addrs.clone())
            .unwrap_or_default()
    }

    /// Records a peer's public key.
    pub fn add_public_key(&self, peer: &PeerId, public_key: [u8; 32]) {
        self.peers.write().entry(*peer).or_default().public_key = Some(public_key);
    }

    /// Returns a peer's public key, if known.
    pub fn public_key(&self, peer: &PeerId) -> Option<[u8; 32]> {
        self.peers.read().get(peer).and_then(|r| r.public_key)
    }

    /// Returns all peers with at least one known address.
    pub fn peers_with_addrs(&self) -> Vec<PeerId> {
        self.peers
            .read()
            .iter()
            .filter(|(_, r)| !r.addrs.is_empty())
            .map(|(id, _)| *id)
            .collect()
    }
}
