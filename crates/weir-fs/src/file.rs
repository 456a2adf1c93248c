//! Mutable file nodes.
//!
//! A file buffers writes in memory; the buffer is folded into a fresh
//! File-kind DAG node when the current node is requested or the file is
//! flushed. Flushing propagates the node to the parent directory, which
//! re-links the path up to the root.

use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use tracing::trace;
use weir_proto::DagNode;

use crate::node::ChildCloser;
use crate::FsError;

struct FileInner {
    node: DagNode,
    /// Pending writes; `None` while the node is authoritative.
    buffer: Option<BytesMut>,
}

/// A mutable file in the overlay.
pub struct FsFile {
    name: RwLock<String>,
    parent: Weak<dyn ChildCloser>,
    inner: Mutex<FileInner>,
}

impl FsFile {
    pub(crate) fn new(name: &str, node: DagNode, parent: Weak<dyn ChildCloser>) -> Arc<Self> {
        Arc::new(Self {
            name: RwLock::new(name.to_string()),
            parent,
            inner: Mutex::new(FileInner { node, buffer: None }),
        })
    }

    /// Returns the file's name under its parent.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.write() = name.to_string();
    }

    /// Returns the current content size in bytes.
    pub fn size(&self) -> Result<u64, FsError> {
        let inner = self.inner.lock();
        match &inner.buffer {
            Some(buffer) => Ok(buffer.len() as u64),
            None => Ok(inner.node.node_data()?.content.len() as u64),
        }
    }

    /// Reads the full content, including unflushed writes.
    pub fn read(&self) -> Result<Bytes, FsError> {
        let inner = self.inner.lock();
        match &inner.buffer {
            Some(buffer) => Ok(Bytes::copy_from_slice(buffer)),
            None => Ok(inner.node.node_data()?.content),
        }
    }

    /// Appends `data` to the write buffer. Returns the number of bytes
    /// written.
    pub fn write(&self, data: &[u8]) -> Result<usize, FsError> {
        let mut inner = self.inner.lock();
        if inner.buffer.is_none() {
            let current = inner.node.node_data()?.content;
            inner.buffer = Some(BytesMut::from(&current[..]));
        }
        if let Some(buffer) = inner.buffer.as_mut() {
            buffer.extend_from_slice(data);
        }
        Ok(data.len())
    }

    /// Discards the content, leaving an empty write buffer.
    pub fn truncate(&self) {
        self.inner.lock().buffer = Some(BytesMut::new());
    }

    /// Returns the current DAG node, folding any buffered writes into it
    /// first.
    pub fn get_node(&self) -> Result<DagNode, FsError> {
        let mut inner = self.inner.lock();
        if let Some(buffer) = inner.buffer.take() {
            inner.node = DagNode::file(buffer.freeze());
        }
        Ok(inner.node.clone())
    }

    /// Commits buffered writes and propagates the node to the parent.
    ///
    /// The file lock is released before propagation; the parent link is
    /// updated from a consistent snapshot of the content.
    pub fn flush(&self) -> Result<(), FsError> {
        let node = self.get_node()?;
        let name = self.name();
        trace!(file = %name, "flushing file");
        match self.parent.upgrade() {
            Some(parent) => parent.close_child(&name, &node),
            None => Ok(()),
        }
    }
}
