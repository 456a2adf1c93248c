//! Multi-node test network with topology helpers.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weir_dht::BootstrapConfig;
use weir_net::MemNetwork;

use crate::node::TestNode;

/// A set of test nodes on one loopback network.
#[derive(Default)]
pub struct TestNetwork {
    /// The underlying loopback network.
    pub network: MemNetwork,
    nodes: Vec<Arc<TestNode>>,
}

impl TestNetwork {
    /// Creates an empty network.
    ///
    /// Installs a tracing subscriber controlled by `RUST_LOG` so test
    /// runs can be inspected; repeated installs are ignored.
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Self::default()
    }

    /// Creates a network with `count` unconnected nodes.
    pub fn with_nodes(count: usize) -> Self {
        let mut network = Self::new();
        for _ in 0..count {
            network.add_node();
        }
        network
    }

    /// Adds a node to the network.
    pub fn add_node(&mut self) -> Arc<TestNode> {
        let node = TestNode::new(&self.network);
        self.nodes.push(Arc::clone(&node));
        node
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node at `index`.
    pub fn node(&self, index: usize) -> &Arc<TestNode> {
        &self.nodes[index]
    }

    /// Returns all nodes.
    pub fn nodes(&self) -> &[Arc<TestNode>] {
        &self.nodes
    }

    /// Connects node `a` to node `b`.
    pub async fn connect(&self, a: usize, b: usize) {
        self.nodes[a]
            .connect_to(&self.nodes[b])
            .await
            .expect("test nodes should connect");
    }

    /// Connects the nodes in a ring: each node to its successor.
    pub async fn connect_ring(&self) {
        for i in 0..self.nodes.len() {
            self.connect(i, (i + 1) % self.nodes.len()).await;
        }
        info!(nodes = self.nodes.len(), "connected ring topology");
    }

    /// Connects every pair of nodes.
    pub async fn connect_mesh(&self) {
        for i in 0..self.nodes.len() {
            for j in (i + 1)..self.nodes.len() {
                self.connect(i, j).await;
            }
        }
        info!(nodes = self.nodes.len(), "connected mesh topology");
    }

    /// Runs one bootstrap cycle on every node, sequentially with a
    /// random start offset. Sequential cycles converge faster than
    /// parallel ones because each lookup builds on the tables the
    /// previous ones filled.
    pub async fn bootstrap_all(&self, cfg: &BootstrapConfig) {
        if self.nodes.is_empty() {
            return;
        }
        let start = rand::thread_rng().gen_range(0..self.nodes.len());
        for i in 0..self.nodes.len() {
            let node = &self.nodes[(start + i) % self.nodes.len()];
            let cancel = CancellationToken::new();
            if let Err(error) = node.dht.bootstrap(cfg, &cancel).await {
                info!(peer = %node.peer_id, %error, "bootstrap cycle failed");
            }
        }
    }

    /// Waits until every routing table holds at least `min_peers` and
    /// the average table size is at least `avg_peers` (zero disables a
    /// criterion). Returns false on timeout.
    pub async fn wait_for_well_formed_tables(
        &self,
        min_peers: usize,
        avg_peers: usize,
        timeout: Duration,
    ) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.tables_well_formed(min_peers, avg_peers) {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        false
    }

    fn tables_well_formed(&self, min_peers: usize, avg_peers: usize) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        let mut total = 0;
        for node in &self.nodes {
            let size = node.table_size();
            total += size;
            if min_peers > 0 && size < min_peers {
                return false;
            }
        }
        avg_peers == 0 || total / self.nodes.len() >= avg_peers
    }

    /// Returns the average routing table size.
    pub fn average_table_size(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.nodes.iter().map(|n| n.table_size()).sum::<usize>() / self.nodes.len()
    }
}
