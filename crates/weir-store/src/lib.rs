//! Weir Store - storage collaborator interfaces.
//!
//! The overlay core does not own persistence. This crate defines the two
//! storage seams it depends on - the content-addressed DAG service and the
//! flat datastore - together with in-memory implementations used by tests
//! and single-process deployments.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod dag_store;
pub mod datastore;

pub use dag_store::{DagService, MemDagStore};
pub use datastore::{Datastore, MemDatastore};

use thiserror::Error;
use weir_core::Cid;

/// Storage errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No node stored under the given content address.
    #[error("node not found: {0}")]
    NotFound(Cid),

    /// The backing store failed.
    #[error("storage backend: {0}")]
    Backend(String),
}
