//! Filesystem roots and the roots registry.
//!
//! An [`FsRoot`] terminates the `close_child` recursion: it commits the
//! root directory's node to the DAG store, records the new root content
//! address and hands it to the publisher callback. The [`Filesystem`]
//! keeps named roots and exposes the path-based API.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;
use weir_core::Cid;
use weir_proto::{DagNode, DataKind};
use weir_store::DagService;

use crate::dir::FsDir;
use crate::file::FsFile;
use crate::node::{ChildCloser, FsNode};
use crate::{split_path, FsError, OpenMode};

/// Callback invoked with each newly published root content address.
pub type RootPublisher = Box<dyn Fn(Cid) + Send + Sync>;

/// A mounted root of the overlay.
pub struct FsRoot {
    dag: Arc<dyn DagService>,
    publisher: Option<RootPublisher>,
    root_cid: Mutex<Cid>,
    dir: Arc<FsDir>,
}

impl FsRoot {
    /// Creates a root over `node`, which must be a directory.
    pub fn new(
        dag: Arc<dyn DagService>,
        node: DagNode,
        publisher: Option<RootPublisher>,
    ) -> Result<Arc<Self>, FsError> {
        if node.node_data()?.kind != DataKind::Directory {
            return Err(FsError::NotDirectory("root".to_string()));
        }
        let cid = dag.add(&node)?;

        let root = Arc::new_cyclic(|weak: &Weak<FsRoot>| {
            let closer: Weak<dyn ChildCloser> = weak.clone();
            let dir = FsDir::new("", node, closer, Arc::clone(&dag));
            FsRoot {
                dag,
                publisher,
                root_cid: Mutex::new(cid),
                dir,
            }
        });
        Ok(root)
    }

    /// Returns the root directory.
    pub fn dir(&self) -> Arc<FsDir> {
        Arc::clone(&self.dir)
    }

    /// Returns the most recently published root content address.
    pub fn root_cid(&self) -> Cid {
        *self.root_cid.lock()
    }

    // === Path API ===

    /// Opens the file at `path`.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<Arc<FsFile>, FsError> {
        let parts = split_path(path);
        self.dir.open(&parts, mode)
    }

    /// Creates the directory at `path`; parents must exist.
    pub fn mkdir(&self, path: &str) -> Result<Arc<FsDir>, FsError> {
        let parts = split_path(path);
        let Some((&last, prefix)) = parts.split_last() else {
            return Err(FsError::AlreadyExists("/".to_string()));
        };
        self.resolve_dir(prefix)?.mkdir(last)
    }

    /// Removes the entry at `path`.
    pub fn unlink(&self, path: &str) -> Result<(), FsError> {
        let parts = split_path(path);
        let Some((&last, prefix)) = parts.split_last() else {
            return Err(FsError::InvalidPath(path.to_string()));
        };
        self.resolve_dir(prefix)?.unlink(last)
    }

    /// Moves the entry at `old` to `new`.
    ///
    /// Within one directory this is a rename; across directories the
    /// node is re-linked at the destination and unlinked from the
    /// source.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), FsError> {
        let old_parts = split_path(old);
        let new_parts = split_path(new);
        let (Some((&old_name, old_prefix)), Some((&new_name, new_prefix))) =
            (old_parts.split_last(), new_parts.split_last())
        else {
            return Err(FsError::InvalidPath(format!("{old} -> {new}")));
        };

        let old_dir = self.resolve_dir(old_prefix)?;
        if old_prefix == new_prefix {
            return old_dir.rename_entry(old_name, new_name);
        }

        let new_dir = self.resolve_dir(new_prefix)?;
        let node = old_dir.child(old_name)?.get_node()?;
        new_dir.add_child(new_name, node)?;
        old_dir.unlink(old_name)
    }

    /// Lists the entry names of the directory at `path`.
    pub fn list(&self, path: &str) -> Result<Vec<String>, FsError> {
        Ok(self.resolve_dir(&split_path(path))?.list())
    }

    /// Flushes the node at `path` and returns the resulting root
    /// content address.
    pub fn flush(&self, path: &str) -> Result<Cid, FsError> {
        match self.node_at(path)? {
            FsNode::Dir(dir) => dir.flush()?,
            FsNode::File(file) => file.flush()?,
        }
        Ok(self.root_cid())
    }

    /// Resolves the node at `path`; the empty path is the root
    /// directory.
    pub fn node_at(&self, path: &str) -> Result<FsNode, FsError> {
        let parts = split_path(path);
        let Some((&last, prefix)) = parts.split_last() else {
            return Ok(FsNode::Dir(self.dir()));
        };
        self.resolve_dir(prefix)?.child(last)
    }

    fn resolve_dir(&self, parts: &[&str]) -> Result<Arc<FsDir>, FsError> {
        let mut current = self.dir();
        for &part in parts {
            current = current.child_dir(part)?;
        }
        Ok(current)
    }
}

impl ChildCloser for FsRoot {
    fn close_child(&self, _name: &str, node: &DagNode) -> Result<(), FsError> {
        let cid = self.dag.add(node)?;
        *self.root_cid.lock() = cid;
        debug!(root = %cid, "published new root");
        if let Some(publish) = &self.publisher {
            publish(cid);
        }
        Ok(())
    }
}

/// Registry of named roots over one DAG store.
pub struct Filesystem {
    dag: Arc<dyn DagService>,
    roots: Mutex<HashMap<String, Arc<FsRoot>>>,
}

impl Filesystem {
    /// Creates a filesystem over the given DAG store.
    pub fn new(dag: Arc<dyn DagService>) -> Self {
        Self {
            dag,
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a fresh, empty root under `name`.
    pub fn new_root(
        &self,
        name: &str,
        publisher: Option<RootPublisher>,
    ) -> Result<Arc<FsRoot>, FsError> {
        let mut roots = self.roots.lock();
        if roots.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let root = FsRoot::new(Arc::clone(&self.dag), DagNode::directory(), publisher)?;
        roots.insert(name.to_string(), Arc::clone(&root));
        Ok(root)
    }

    /// Opens an existing DAG directory as the root named `name`.
    pub fn open_root(
        &self,
        name: &str,
        cid: Cid,
        publisher: Option<RootPublisher>,
    ) -> Result<Arc<FsRoot>, FsError> {
        let mut roots = self.roots.lock();
        if roots.contains_key(name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let node = self.dag.get(&cid)?;
        let root = FsRoot::new(Arc::clone(&self.dag), node, publisher)?;
        roots.insert(name.to_string(), Arc::clone(&root));
        Ok(root)
    }

    /// Returns the root registered under `name`.
    pub fn root(&self, name: &str) -> Option<Arc<FsRoot>> {
        self.roots.lock().get(name).cloned()
    }

    /// Drops the root registered under `name`, returning it if present.
    pub fn close_root(&self, name: &str) -> Option<Arc<FsRoot>> {
        self.roots.lock().remove(name)
    }
}
