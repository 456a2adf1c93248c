//! The overlay node variant and the upward propagation seam.

use std::sync::Arc;

use weir_proto::DagNode;

use crate::dir::FsDir;
use crate::file::FsFile;
use crate::FsError;

/// Receives a child's updated DAG node after a mutation.
///
/// Implemented by directories and by the root. The implementor commits
/// the node to the DAG store, replaces its own link under `name`, and
/// propagates its updated node to its own parent; the recursion ends at
/// the root, which publishes the new root content address.
pub trait ChildCloser: Send + Sync {
    /// Accepts the updated node of the child named `name`.
    fn close_child(&self, name: &str, node: &DagNode) -> Result<(), FsError>;
}

/// Kind of an overlay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsNodeKind {
    /// A directory.
    Directory,
    /// A regular file.
    File,
}

/// A materialized overlay node.
#[derive(Clone)]
pub enum FsNode {
    /// A directory.
    Dir(Arc<FsDir>),
    /// A file.
    File(Arc<FsFile>),
}

impl FsNode {
    /// Returns the node kind.
    pub fn kind(&self) -> FsNodeKind {
        match self {
            FsNode::Dir(_) => FsNodeKind::Directory,
            FsNode::File(_) => FsNodeKind::File,
        }
    }

    /// Returns the node's current DAG node, flushing buffered file
    /// writes.
    pub fn get_node(&self) -> Result<DagNode, FsError> {
        match self {
            FsNode::Dir(dir) => Ok(dir.get_node()),
            FsNode::File(file) => file.get_node(),
        }
    }

    /// Returns the node's name under its parent.
    pub fn name(&self) -> String {
        match self {
            FsNode::Dir(dir) => dir.name(),
            FsNode::File(file) => file.name(),
        }
    }
}
