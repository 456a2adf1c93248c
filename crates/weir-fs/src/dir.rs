//! Mutable directory nodes.
//!
//! A directory guards all of its state - its DAG node and the two
//! materialization maps - with a single mutex. Mutations hold that mutex
//! while propagating the updated node to the parent, so the lock order is
//! strictly child before parent; the tree is acyclic, so the order admits
//! no cycles. The parent is reached through a weak handle: the relation
//! is not ownership, and strong references only ever point root-downward.
//!
//! Renames never lock a child directory: the parent's own link already
//! carries the child's last committed node, because every directory
//! mutation propagates immediately. Files are the exception - their
//! buffered writes are folded in via `get_node`, which takes only the
//! file's lock.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};
use weir_proto::{DagNode, DataKind};
use weir_store::DagService;

use crate::file::FsFile;
use crate::node::{ChildCloser, FsNode};
use crate::{FsError, OpenMode};

struct DirInner {
    node: DagNode,
    child_dirs: HashMap<String, Arc<FsDir>>,
    files: HashMap<String, Arc<FsFile>>,
}

/// A mutable directory in the overlay.
pub struct FsDir {
    dag: Arc<dyn DagService>,
    name: RwLock<String>,
    parent: Weak<dyn ChildCloser>,
    inner: Mutex<DirInner>,
}

impl FsDir {
    pub(crate) fn new(
        name: &str,
        node: DagNode,
        parent: Weak<dyn ChildCloser>,
        dag: Arc<dyn DagService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            dag,
            name: RwLock::new(name.to_string()),
            parent,
            inner: Mutex::new(DirInner {
                node,
                child_dirs: HashMap::new(),
                files: HashMap::new(),
            }),
        })
    }

    /// Returns the directory's name under its parent.
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    fn set_name(&self, name: &str) {
        *self.name.write() = name.to_string();
    }

    fn as_closer(self: &Arc<Self>) -> Weak<dyn ChildCloser> {
        let strong: Arc<dyn ChildCloser> = self.clone() as Arc<dyn ChildCloser>;
        Arc::downgrade(&strong)
    }

    /// Sends the current node to the parent while `inner` is held, so no
    /// other mutation of this directory can interleave with propagation.
    fn propagate(&self, inner: &DirInner) -> Result<(), FsError> {
        match self.parent.upgrade() {
            Some(parent) => parent.close_child(&self.name(), &inner.node),
            None => {
                trace!(dir = %self.name(), "propagation stopped at detached node");
                Ok(())
            }
        }
    }

    fn has_entry(inner: &DirInner, name: &str) -> bool {
        inner.child_dirs.contains_key(name)
            || inner.files.contains_key(name)
            || inner.node.has_link(name)
    }

    /// Resolves a child file, materializing it from the DAG on first
    /// access. A child is materialized at most once.
    fn child_file_locked(
        self: &Arc<Self>,
        inner: &mut DirInner,
        name: &str,
    ) -> Result<Arc<FsFile>, FsError> {
        if let Some(file) = inner.files.get(name) {
            return Ok(Arc::clone(file));
        }
        if inner.child_dirs.contains_key(name) {
            return Err(FsError::IsDirectory);
        }

        let Some(link) = inner.node.link(name) else {
            return Err(FsError::NotFound);
        };
        let node = self.dag.get(&link.cid)?;
        match node.node_data()?.kind {
            DataKind::Directory => Err(FsError::IsDirectory),
            DataKind::File | DataKind::Raw => {
                let file = FsFile::new(name, node, self.as_closer());
                inner.files.insert(name.to_string(), Arc::clone(&file));
                Ok(file)
            }
            DataKind::Metadata => Err(FsError::NotYetImplemented),
        }
    }

    /// Resolves a child directory, materializing it from the DAG on
    /// first access.
    fn child_dir_locked(
        self: &Arc<Self>,
        inner: &mut DirInner,
        name: &str,
    ) -> Result<Arc<FsDir>, FsError> {
        if let Some(dir) = inner.child_dirs.get(name) {
            return Ok(Arc::clone(dir));
        }
        if inner.files.contains_key(name) {
            return Err(FsError::NotDirectory(name.to_string()));
        }

        let Some(link) = inner.node.link(name) else {
            return Err(FsError::NotFound);
        };
        let node = self.dag.get(&link.cid)?;
        match node.node_data()?.kind {
            DataKind::Directory => {
                let dir = FsDir::new(name, node, self.as_closer(), Arc::clone(&self.dag));
                inner.child_dirs.insert(name.to_string(), Arc::clone(&dir));
                Ok(dir)
            }
            DataKind::File | DataKind::Raw => Err(FsError::NotDirectory(name.to_string())),
            DataKind::Metadata => Err(FsError::NotYetImplemented),
        }
    }

    /// Resolves a child directory by name.
    pub fn child_dir(self: &Arc<Self>, name: &str) -> Result<Arc<FsDir>, FsError> {
        let mut inner = self.inner.lock();
        self.child_dir_locked(&mut inner, name)
    }

    /// Resolves a child of either kind: directory first, then file.
    pub fn child(self: &Arc<Self>, name: &str) -> Result<FsNode, FsError> {
        let mut inner = self.inner.lock();
        match self.child_dir_locked(&mut inner, name) {
            Ok(dir) => Ok(FsNode::Dir(dir)),
            Err(FsError::NotDirectory(_)) | Err(FsError::NotFound) => {
                let file = self.child_file_locked(&mut inner, name)?;
                Ok(FsNode::File(file))
            }
            Err(err) => Err(err),
        }
    }

    /// Opens the file at `path`, a sequence of components relative to
    /// this directory.
    ///
    /// With [`OpenMode::CREATE`] set, a missing final component is
    /// created as an empty file; the new file is linked into the DAG on
    /// its first flush.
    pub fn open(self: &Arc<Self>, path: &[&str], mode: OpenMode) -> Result<Arc<FsFile>, FsError> {
        let Some((&first, rest)) = path.split_first() else {
            return Err(FsError::IsDirectory);
        };

        if rest.is_empty() {
            let mut inner = self.inner.lock();
            return match self.child_file_locked(&mut inner, first) {
                Ok(file) => Ok(file),
                Err(FsError::NotFound) if mode.contains(OpenMode::CREATE) => {
                    let file =
                        FsFile::new(first, DagNode::file(Default::default()), self.as_closer());
                    inner.files.insert(first.to_string(), Arc::clone(&file));
                    debug!(dir = %self.name(), file = first, "created file");
                    Ok(file)
                }
                Err(err) => Err(err),
            };
        }

        let child = {
            let mut inner = self.inner.lock();
            self.child_dir_locked(&mut inner, first)?
        };
        child.open(rest, mode)
    }

    /// Creates an empty child directory.
    pub fn mkdir(self: &Arc<Self>, name: &str) -> Result<Arc<FsDir>, FsError> {
        let mut inner = self.inner.lock();
        if Self::has_entry(&inner, name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let node = DagNode::directory();
        let cid = self.dag.add(&node)?;
        inner.node.set_link(name, cid, node.encoded_size());

        let dir = FsDir::new(name, node, self.as_closer(), Arc::clone(&self.dag));
        inner.child_dirs.insert(name.to_string(), Arc::clone(&dir));
        debug!(dir = %self.name(), child = name, "created directory");

        self.propagate(&inner)?;
        Ok(dir)
    }

    /// Adds an existing DAG node under this directory as `name`.
    pub fn add_child(self: &Arc<Self>, name: &str, node: DagNode) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        let kind = node.node_data()?.kind;
        if Self::has_entry(&inner, name) {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let cid = self.dag.add(&node)?;
        inner.node.set_link(name, cid, node.encoded_size());
        match kind {
            DataKind::Directory => {
                let dir = FsDir::new(name, node, self.as_closer(), Arc::clone(&self.dag));
                inner.child_dirs.insert(name.to_string(), dir);
            }
            DataKind::File | DataKind::Raw | DataKind::Metadata => {
                let file = FsFile::new(name, node, self.as_closer());
                inner.files.insert(name.to_string(), file);
            }
        }
        self.propagate(&inner)
    }

    /// Removes the entry named `name`.
    pub fn unlink(self: &Arc<Self>, name: &str) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner.child_dirs.remove(name);
        inner.files.remove(name);
        if !inner.node.remove_link(name) {
            return Err(FsError::NotFound);
        }
        debug!(dir = %self.name(), child = name, "unlinked entry");
        self.propagate(&inner)
    }

    /// Renames the child `old` to `new` within this directory.
    ///
    /// Resolves `old` as a directory first, then as a file. A file's
    /// current node is obtained via `get_node`, folding in buffered
    /// writes, before the new link is added.
    pub fn rename_entry(self: &Arc<Self>, old: &str, new: &str) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        if Self::has_entry(&inner, new) {
            return Err(FsError::AlreadyExists(new.to_string()));
        }

        match self.child_dir_locked(&mut inner, old) {
            Ok(dir) => {
                // The parent's link is the child's last committed node;
                // directory mutations always propagate immediately.
                let link = inner.node.link(old).cloned().ok_or(FsError::NotFound)?;
                inner.node.remove_link(old);
                inner.node.set_link(new, link.cid, link.size);
                dir.set_name(new);
                inner.child_dirs.remove(old);
                inner.child_dirs.insert(new.to_string(), dir);
                self.propagate(&inner)
            }
            Err(_) => {
                let file = self.child_file_locked(&mut inner, old)?;
                let node = file.get_node()?;
                let cid = self.dag.add(&node)?;
                inner.node.remove_link(old);
                inner.node.set_link(new, cid, node.encoded_size());
                file.set_name(new);
                inner.files.remove(old);
                inner.files.insert(new.to_string(), file);
                self.propagate(&inner)
            }
        }
    }

    /// Lists the entry names recorded in the directory's DAG node.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.node.links.iter().map(|l| l.name.clone()).collect()
    }

    /// Returns the directory's current DAG node.
    pub fn get_node(&self) -> DagNode {
        self.inner.lock().node.clone()
    }

    /// Propagates the current node upward without mutating anything.
    pub fn flush(&self) -> Result<(), FsError> {
        let inner = self.inner.lock();
        self.propagate(&inner)
    }
}

impl ChildCloser for FsDir {
    fn close_child(&self, name: &str, node: &DagNode) -> Result<(), FsError> {
        let cid = self.dag.add(node)?;
        let size = node.encoded_size();
        let mut inner = self.inner.lock();
        inner.node.set_link(name, cid, size);
        self.propagate(&inner)
    }
}
