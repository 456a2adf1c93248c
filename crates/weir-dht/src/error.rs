//! DHT error taxonomy.

use thiserror::Error;
use weir_net::HostError;
use weir_store::StoreError;

/// Errors surfaced by DHT operations.
#[derive(Debug, Error)]
pub enum DhtError {
    /// The key or peer is absent locally and the lookup exhausted.
    #[error("not found")]
    NotFound,

    /// A validator rejected a record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A received message violates the protocol.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The operation deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Every one of the k store targets failed.
    #[error("store rejected by all {0} target peers")]
    AllStoresFailed(usize),

    /// Per-peer transport failure reported by the Host.
    #[error(transparent)]
    Transport(#[from] HostError),

    /// Failure in the backing datastore.
    #[error(transparent)]
    Store(#[from] StoreError),
}
