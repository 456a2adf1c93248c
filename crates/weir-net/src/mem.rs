//! In-process loopback network.
//!
//! `MemNetwork` registers hosts by peer id and routes framed messages
//! between them. Requests still pass through the wire codec so tests
//! exercise real frames, and each inbound request runs on its own task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use tracing::trace;
use weir_core::{Keypair, PeerId};
use weir_proto::{DhtMessage, MessageCodec};

use crate::host::{Host, HostError, RequestHandler};
use crate::peerstore::Peerstore;

#[derive(Default)]
struct NetworkState {
    hosts: HashMap<PeerId, Arc<MemHost>>,
    offline: HashSet<PeerId>,
}

/// A registry of in-process hosts.
#[derive(Clone, Default)]
pub struct MemNetwork {
    state: Arc<RwLock<NetworkState>>,
}

impl MemNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new host on this network.
    pub fn add_host(&self, keypair: Keypair) -> Arc<MemHost> {
        let id = keypair.peer_id();
        let addr = format!("/mem/{}", &id.to_hex()[..8]);
        let host = Arc::new(MemHost {
            id,
            addr,
            keypair,
            network: Arc::clone(&self.state),
            peerstore: Peerstore::new(),
            handler: RwLock::new(None),
            connected: RwLock::new(HashSet::new()),
        });
        self.state.write().hosts.insert(id, Arc::clone(&host));
        host
    }

    /// Takes a host offline; sends to it fail and probes report it dead.
    pub fn partition(&self, peer: &PeerId) {
        self.state.write().offline.insert(*peer);
    }

    /// Brings a partitioned host back online.
    pub fn heal(&self, peer: &PeerId) {
        self.state.write().offline.remove(peer);
    }

    /// Returns the number of registered hosts.
    pub fn len(&self) -> usize {
        self.state.read().hosts.len()
    }

    /// Returns true if no hosts are registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().hosts.is_empty()
    }
}

/// A host on a [`MemNetwork`].
pub struct MemHost {
    id: PeerId,
    addr: String,
    keypair: Keypair,
    network: Arc<RwLock<NetworkState>>,
    peerstore: Peerstore,
    handler: RwLock<Option<RequestHandler>>,
    connected: RwLock<HashSet<PeerId>>,
}

impl MemHost {
    fn reachable(&self, peer: &PeerId) -> Result<Arc<MemHost>, HostError> {
        let state = self.network.read();
        if state.offline.contains(peer) || state.offline.contains(&self.id) {
            return Err(HostError::Unreachable(*peer));
        }
        state
            .hosts
            .get(peer)
            .cloned()
            .ok_or(HostError::Unreachable(*peer))
    }

    /// Handles one inbound framed request and returns the framed response.
    fn accept(&self, from: PeerId, from_addr: String, frame: Bytes) -> Result<Bytes, HostError> {
        let mut buf = BytesMut::from(&frame[..]);
        let request = MessageCodec::decode_frame(&mut buf)?.ok_or_else(|| {
            HostError::Handler("truncated request frame".to_string())
        })?;

        // Connection-derived bookkeeping: remember how to reach the dialer.
        self.peerstore.add_addrs(&from, &[from_addr]);
        self.connected.write().insert(from);

        let handler = self.handler.read().clone().ok_or(HostError::NoHandler)?;
        trace!(from = %from, kind = ?request.kind, "inbound request");
        let response = handler(from, request)?;
        Ok(MessageCodec::encode_frame(&response))
    }
}

#[async_trait]
impl Host for MemHost {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn local_addrs(&self) -> Vec<String> {
        vec![self.addr.clone()]
    }

    fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    fn peerstore(&self) -> &Peerstore {
        &self.peerstore
    }

    fn set_handler(&self, handler: RequestHandler) {
        *self.handler.write() = Some(handler);
    }

    async fn connect(&self, peer: &PeerId) -> Result<(), HostError> {
        let target = self.reachable(peer)?;
        self.connected.write().insert(*peer);
        target.connected.write().insert(self.id);
        Ok(())
    }

    fn is_connected(&self, peer: &PeerId) -> bool {
        if !self.connected.read().contains(peer) {
            return false;
        }
        let state = self.network.read();
        !state.offline.contains(peer) && state.hosts.contains_key(peer)
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let peers: Vec<PeerId> = self.connected.read().iter().copied().collect();
        peers.into_iter().filter(|p| self.is_connected(p)).collect()
    }

    async fn send_request(
        &self,
        peer: &PeerId,
        request: DhtMessage,
        timeout: Duration,
    ) -> Result<DhtMessage, HostError> {
        let target = self.reachable(peer)?;

        // Dial on demand; iterative lookups contact peers they have only
        // just discovered.
        self.connected.write().insert(*peer);
        target.connected.write().insert(self.id);

        let frame = MessageCodec::encode_frame(&request);
        let from = self.id;
        let from_addr = self.addr.clone();

        let task = tokio::spawn(async move { target.accept(from, from_addr, frame) });

        let response_frame = match tokio::time::timeout(timeout, task).await {
            Err(_) => return Err(HostError::Timeout),
            Ok(Err(join)) => return Err(HostError::Handler(join.to_string())),
            Ok(Ok(result)) => result?,
        };

        let mut buf = BytesMut::from(&response_frame[..]);
        MessageCodec::decode_frame(&mut buf)?
            .ok_or_else(|| HostError::Handler("truncated response frame".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_proto::MessageKind;

    fn echo_handler() -> RequestHandler {
        Arc::new(|_from, request| Ok(DhtMessage::response_to(&request)))
    }

    #[tokio::test]
    async fn test_request_response() {
        let network = MemNetwork::new();
        let a = network.add_host(Keypair::generate());
        let b = network.add_host(Keypair::generate());
        b.set_handler(echo_handler());

        let request = DhtMessage::request(MessageKind::Ping, Bytes::new());
        let response = a
            .send_request(&b.local_id(), request, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.kind, MessageKind::Ping);
    }

    #[tokio::test]
    async fn test_send_marks_connected_both_sides() {
        let network = MemNetwork::new();
        let a = network.add_host(Keypair::generate());
        let b = network.add_host(Keypair::generate());
        b.set_handler(echo_handler());

        a.send_request(
            &b.local_id(),
            DhtMessage::request(MessageKind::Ping, Bytes::new()),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert!(a.is_connected(&b.local_id()));
        assert!(b.is_connected(&a.local_id()));
        // The callee learned the dialer's address from the connection.
        assert_eq!(b.peerstore().addrs(&a.local_id()), a.local_addrs());
    }

    #[tokio::test]
    async fn test_no_handler() {
        let network = MemNetwork::new();
        let a = network.add_host(Keypair::generate());
        let b = network.add_host(Keypair::generate());

        let err = a
            .send_request(
                &b.local_id(),
                DhtMessage::request(MessageKind::Ping, Bytes::new()),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::NoHandler));
    }

    #[tokio::test]
    async fn test_partition() {
        let network = MemNetwork::new();
        let a = network.add_host(Keypair::generate());
        let b = network.add_host(Keypair::generate());
        b.set_handler(echo_handler());

        a.connect(&b.local_id()).await.unwrap();
        assert!(a.is_connected(&b.local_id()));

        network.partition(&b.local_id());
        assert!(!a.is_connected(&b.local_id()));

        let err = a
            .send_request(
                &b.local_id(),
                DhtMessage::request(MessageKind::Ping, Bytes::new()),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Unreachable(_)));

        network.heal(&b.local_id());
        assert!(a.is_connected(&b.local_id()));
    }

    #[tokio::test]
    async fn test_unknown_peer_unreachable() {
        let network = MemNetwork::new();
        let a = network.add_host(Keypair::generate());

        let err = a.connect(&PeerId::random()).await.unwrap_err();
        assert!(matches!(err, HostError::Unreachable(_)));
    }
}
