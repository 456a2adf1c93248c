//! Merkle DAG node model.
//!
//! A DAG node carries an opaque data blob and an ordered list of named
//! links to other nodes. Its content address is the BLAKE3 hash of its
//! canonical encoding, so any change to data or links produces a new node.
//!
//! The filesystem overlay stores a typed payload (`NodeData`) in the data
//! blob; the declared kind drives child materialization.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use weir_core::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
use weir_core::Cid;

/// A named, sized link to another DAG node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagLink {
    /// Link name, unique within the parent node.
    pub name: String,
    /// Content address of the target node.
    pub cid: Cid,
    /// Size of the target node's encoding, in bytes.
    pub size: u64,
}

impl CanonicalEncode for DagLink {
    fn encode(&self, buf: &mut BytesMut) {
        self.name.encode(buf);
        self.cid.encode(buf);
        self.size.encode(buf);
    }
}

impl CanonicalDecode for DagLink {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            name: String::decode(buf)?,
            cid: Cid::decode(buf)?,
            size: u64::decode(buf)?,
        })
    }
}

/// An immutable DAG node: a data blob plus an ordered list of named links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    /// Opaque payload.
    pub data: Bytes,
    /// Named links to child nodes, in insertion order.
    pub links: Vec<DagLink>,
}

impl DagNode {
    /// Creates a node with the given data and no links.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            links: Vec::new(),
        }
    }

    /// Creates an empty directory node.
    pub fn directory() -> Self {
        Self::new(NodeData::directory().to_bytes())
    }

    /// Creates a file node holding `content`.
    pub fn file(content: Bytes) -> Self {
        Self::new(NodeData::file(content).to_bytes())
    }

    /// Computes this node's content address.
    pub fn cid(&self) -> Cid {
        Cid::from_encoded(&self.to_vec())
    }

    /// Returns the size of this node's encoding in bytes.
    pub fn encoded_size(&self) -> u64 {
        self.to_vec().len() as u64
    }

    /// Returns the link with the given name, if present.
    pub fn link(&self, name: &str) -> Option<&DagLink> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Returns true if a link with the given name exists.
    pub fn has_link(&self, name: &str) -> bool {
        self.link(name).is_some()
    }

    /// Inserts or replaces the link with the given name.
    ///
    /// Replacement keeps at most one link per name; a replaced link keeps
    /// its position, a new link is appended.
    pub fn set_link(&mut self, name: &str, cid: Cid, size: u64) {
        if let Some(existing) = self.links.iter_mut().find(|l| l.name == name) {
            existing.cid = cid;
            existing.size = size;
        } else {
            self.links.push(DagLink {
                name: name.to_string(),
                cid,
                size,
            });
        }
    }

    /// Removes the link with the given name. Returns true if it existed.
    pub fn remove_link(&mut self, name: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.name != name);
        self.links.len() != before
    }

    /// Decodes the node's typed payload.
    pub fn node_data(&self) -> Result<NodeData, DecodeError> {
        NodeData::from_bytes(&self.data)
    }
}

impl CanonicalEncode for DagNode {
    fn encode(&self, buf: &mut BytesMut) {
        self.data.encode(buf);
        self.links.encode(buf);
    }
}

impl CanonicalDecode for DagNode {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            data: Bytes::decode(buf)?,
            links: Vec::<DagLink>::decode(buf)?,
        })
    }
}

/// Declared kind of a filesystem DAG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum DataKind {
    /// A directory; children live in the node's link list.
    Directory = 0,
    /// A regular file; bytes live in the payload content.
    File = 1,
    /// Metadata node. Recognized but not supported by the overlay.
    Metadata = 2,
    /// Raw leaf bytes.
    Raw = 3,
}

impl DataKind {
    /// Returns the tag value for encoding.
    pub const fn tag(&self) -> u32 {
        *self as u32
    }

    /// Creates from a tag value.
    pub fn from_tag(tag: u32) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(DataKind::Directory),
            1 => Ok(DataKind::File),
            2 => Ok(DataKind::Metadata),
            3 => Ok(DataKind::Raw),
            _ => Err(DecodeError::InvalidEnumTag(tag)),
        }
    }
}

/// Typed payload stored in a filesystem DAG node's data blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    /// Declared node kind.
    pub kind: DataKind,
    /// Content bytes; file bytes for `File`/`Raw`, empty for directories.
    pub content: Bytes,
}

impl NodeData {
    /// Creates a directory payload.
    pub fn directory() -> Self {
        Self {
            kind: DataKind::Directory,
            content: Bytes::new(),
        }
    }

    /// Creates a file payload with the given content.
    pub fn file(content: Bytes) -> Self {
        Self {
            kind: DataKind::File,
            content,
        }
    }
}

impl CanonicalEncode for NodeData {
    fn encode(&self, buf: &mut BytesMut) {
        self.kind.tag().encode(buf);
        self.content.encode(buf);
    }
}

impl CanonicalDecode for NodeData {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            kind: DataKind::from_tag(u32::decode(buf)?)?,
            content: Bytes::decode(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_tracks_content() {
        let a = DagNode::file(Bytes::from_static(b"hello"));
        let b = DagNode::file(Bytes::from_static(b"world"));
        assert_ne!(a.cid(), b.cid());

        let a2 = DagNode::file(Bytes::from_static(b"hello"));
        assert_eq!(a.cid(), a2.cid());
    }

    #[test]
    fn test_cid_tracks_links() {
        let mut node = DagNode::directory();
        let before = node.cid();
        node.set_link("child", Cid::new([0x11; 32]), 42);
        assert_ne!(node.cid(), before);
    }

    #[test]
    fn test_set_link_replaces() {
        let mut node = DagNode::directory();
        node.set_link("a", Cid::new([0x11; 32]), 1);
        node.set_link("b", Cid::new([0x22; 32]), 2);
        node.set_link("a", Cid::new([0x33; 32]), 3);

        assert_eq!(node.links.len(), 2);
        assert_eq!(node.link("a").unwrap().cid, Cid::new([0x33; 32]));
        // Replacement keeps position.
        assert_eq!(node.links[0].name, "a");
    }

    #[test]
    fn test_remove_link() {
        let mut node = DagNode::directory();
        node.set_link("a", Cid::new([0x11; 32]), 1);
        assert!(node.remove_link("a"));
        assert!(!node.remove_link("a"));
        assert!(node.links.is_empty());
    }

    #[test]
    fn test_node_roundtrip() {
        let mut node = DagNode::file(Bytes::from_static(b"content"));
        node.set_link("sibling", Cid::new([0xAB; 32]), 7);

        let decoded = DagNode::from_bytes(&node.to_vec()).unwrap();
        assert_eq!(node, decoded);
    }

    #[test]
    fn test_node_data_kinds() {
        let dir = DagNode::directory();
        assert_eq!(dir.node_data().unwrap().kind, DataKind::Directory);

        let file = DagNode::file(Bytes::from_static(b"abc"));
        let data = file.node_data().unwrap();
        assert_eq!(data.kind, DataKind::File);
        assert_eq!(&data.content[..], b"abc");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(DataKind::from_tag(9).is_err());
    }
}
