//! A single test peer: host, stores and DHT wired together.

use std::sync::Arc;

use weir_core::{Keypair, PeerId};
use weir_dht::{Dht, DhtConfig, DhtError, PermissiveValidator};
use weir_net::{Host, MemHost, MemNetwork};
use weir_store::MemDatastore;

/// A peer on an in-process test network.
///
/// Each node carries its own datastore and DAG store and registers the
/// permissive `"v"` validator so unsigned test records are accepted.
pub struct TestNode {
    /// The node's peer id.
    pub peer_id: PeerId,
    /// The loopback host.
    pub host: Arc<MemHost>,
    /// The DHT engine.
    pub dht: Arc<Dht>,
}

impl TestNode {
    /// Creates a node registered on `network`.
    pub fn new(network: &MemNetwork) -> Arc<Self> {
        Self::with_config(network, DhtConfig::for_tests())
    }

    /// Creates a node with a custom DHT configuration.
    pub fn with_config(network: &MemNetwork, config: DhtConfig) -> Arc<Self> {
        let host = network.add_host(Keypair::generate());
        let peer_id = host.local_id();
        let dht = Dht::new(
            Arc::clone(&host) as Arc<dyn Host>,
            Arc::new(MemDatastore::new()),
            config,
        );
        dht.validators()
            .register("v", Arc::new(PermissiveValidator));

        Arc::new(Self { peer_id, host, dht })
    }

    /// Connects this node to `other`, seeding addresses first the way a
    /// caller with out-of-band contact info would.
    pub async fn connect_to(&self, other: &TestNode) -> Result<(), DhtError> {
        self.host
            .peerstore()
            .add_addrs(&other.peer_id, &other.host.local_addrs());
        self.dht.connect(&other.peer_id).await
    }

    /// Returns the routing table size.
    pub fn table_size(&self) -> usize {
        self.dht.routing().size()
    }
}
