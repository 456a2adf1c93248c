//! Content-addressed DAG node storage.

use std::collections::HashMap;

use parking_lot::RwLock;
use weir_core::Cid;
use weir_proto::DagNode;

use crate::StoreError;

/// The DAG service collaborator.
///
/// Implementations must be safe for concurrent add/get. `add` is
/// idempotent: the same node always maps to the same content address.
pub trait DagService: Send + Sync {
    /// Stores a node and returns its content address.
    fn add(&self, node: &DagNode) -> Result<Cid, StoreError>;

    /// Retrieves the node stored under `cid`.
    fn get(&self, cid: &Cid) -> Result<DagNode, StoreError>;

    /// Removes the node stored under `cid`, if present.
    fn remove(&self, cid: &Cid) -> Result<(), StoreError>;
}

/// In-memory content-addressed node store.
#[derive(Default)]
pub struct MemDagStore {
    nodes: RwLock<HashMap<Cid, DagNode>>,
}

impl MemDagStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if no nodes are stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl DagService for MemDagStore {
    fn add(&self, node: &DagNode) -> Result<Cid, StoreError> {
        let cid = node.cid();
        self.nodes.write().insert(cid, node.clone());
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<DagNode, StoreError> {
        self.nodes
            .read()
            .get(cid)
            .cloned()
            .ok_or(StoreError::NotFound(*cid))
    }

    fn remove(&self, cid: &Cid) -> Result<(), StoreError> {
        self.nodes.write().remove(cid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_add_get_roundtrip() {
        let store = MemDagStore::new();
        let node = DagNode::file(Bytes::from_static(b"hello"));

        let cid = store.add(&node).unwrap();
        assert_eq!(cid, node.cid());
        assert_eq!(store.get(&cid).unwrap(), node);
    }

    #[test]
    fn test_add_idempotent() {
        let store = MemDagStore::new();
        let node = DagNode::directory();

        let a = store.add(&node).unwrap();
        let b = store.add(&node).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_node() {
        let store = MemDagStore::new();
        let cid = Cid::new([0x42; 32]);
        assert_eq!(store.get(&cid), Err(StoreError::NotFound(cid)));
    }

    #[test]
    fn test_remove() {
        let store = MemDagStore::new();
        let node = DagNode::directory();
        let cid = store.add(&node).unwrap();

        store.remove(&cid).unwrap();
        assert!(store.get(&cid).is_err());
        // Removing an absent node is not an error.
        store.remove(&cid).unwrap();
    }
}
