//! Weir FS - a mutable filesystem overlay on the immutable Merkle DAG.
//!
//! Directories and files are materialized lazily from DAG nodes and
//! buffered in memory; every successful mutation re-links the path from
//! the mutated node up to the root, committing each ancestor to the DAG
//! store and publishing the new root content address.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod dir;
pub mod file;
pub mod node;
pub mod root;

pub use dir::FsDir;
pub use file::FsFile;
pub use node::{ChildCloser, FsNode, FsNodeKind};
pub use root::{Filesystem, FsRoot, RootPublisher};

use std::ops::BitOr;

use thiserror::Error;
use weir_core::encoding::DecodeError;
use weir_store::StoreError;

/// Filesystem errors.
#[derive(Debug, Error)]
pub enum FsError {
    /// No entry by that name or path.
    #[error("no such file or directory")]
    NotFound,

    /// An entry by that name already exists.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// The path names a directory where a file was expected.
    #[error("is a directory")]
    IsDirectory,

    /// A path component names a file where a directory was expected.
    #[error("{0} is not a directory")]
    NotDirectory(String),

    /// The DAG node's declared type is unknown to the overlay.
    #[error("invalid child node")]
    InvalidChild,

    /// Metadata nodes are recognized but unsupported.
    #[error("not yet implemented")]
    NotYetImplemented,

    /// The path cannot be interpreted.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The DAG store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DecodeError> for FsError {
    fn from(_: DecodeError) -> Self {
        // Undecodable node payloads and unknown type tags are the same
        // failure from the overlay's point of view.
        FsError::InvalidChild
    }
}

/// Open mode bits.
///
/// Create-on-open is requested by the dedicated [`OpenMode::CREATE`] bit;
/// it only applies when the file does not already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode(u8);

impl OpenMode {
    /// Open for reading.
    pub const READ: OpenMode = OpenMode(0b001);
    /// Open for writing.
    pub const WRITE: OpenMode = OpenMode(0b010);
    /// Create the file if it does not exist.
    pub const CREATE: OpenMode = OpenMode(0b100);

    /// Returns true if all bits of `other` are set in `self`.
    pub fn contains(self, other: OpenMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenMode {
    type Output = OpenMode;

    fn bitor(self, rhs: OpenMode) -> OpenMode {
        OpenMode(self.0 | rhs.0)
    }
}

/// Splits a `/`-separated path into components, ignoring empty ones.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_bits() {
        let mode = OpenMode::WRITE | OpenMode::CREATE;
        assert!(mode.contains(OpenMode::CREATE));
        assert!(mode.contains(OpenMode::WRITE));
        assert!(!mode.contains(OpenMode::READ));
        assert!(!OpenMode::READ.contains(OpenMode::CREATE));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(split_path("a/b"), vec!["a", "b"]);
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert_eq!(split_path("//a//b/"), vec!["a", "b"]);
    }
}
