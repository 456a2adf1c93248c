//! The Host collaborator interface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use weir_core::encoding::DecodeError;
use weir_core::{Keypair, PeerId};
use weir_proto::DhtMessage;

use crate::peerstore::Peerstore;

/// Transport-level errors reported by a Host.
///
/// These are per-peer failures; the lookup engine absorbs them without
/// failing the enclosing operation.
#[derive(Debug, Error)]
pub enum HostError {
    /// The peer is unknown or cannot be dialed.
    #[error("peer unreachable: {0}")]
    Unreachable(PeerId),

    /// The request deadline elapsed without a response.
    #[error("request timed out")]
    Timeout,

    /// The remote peer has no request handler installed.
    #[error("remote peer has no handler")]
    NoHandler,

    /// The remote handler failed.
    #[error("remote handler: {0}")]
    Handler(String),

    /// A frame failed to encode or decode.
    #[error("codec: {0}")]
    Codec(#[from] DecodeError),
}

/// Handler invoked for each inbound request.
///
/// Handlers run on independent tasks supplied by the Host and must be
/// cheap and non-blocking.
pub type RequestHandler =
    Arc<dyn Fn(PeerId, DhtMessage) -> Result<DhtMessage, HostError> + Send + Sync>;

/// The network host the overlay core is built against.
///
/// A Host owns the local identity, dials peers, delivers framed request/
/// response messages, and surfaces inbound requests to the installed
/// handler. Implementations must be safe for concurrent sends.
#[async_trait]
pub trait Host: Send + Sync {
    /// Returns the local peer id.
    fn local_id(&self) -> PeerId;

    /// Returns the addresses the local peer is reachable on.
    fn local_addrs(&self) -> Vec<String>;

    /// Returns the local identity keypair.
    fn keypair(&self) -> &Keypair;

    /// Returns the address book.
    fn peerstore(&self) -> &Peerstore;

    /// Installs the inbound request handler, replacing any previous one.
    fn set_handler(&self, handler: RequestHandler);

    /// Establishes a connection to a peer.
    async fn connect(&self, peer: &PeerId) -> Result<(), HostError>;

    /// Returns true if a live connection to the peer exists.
    fn is_connected(&self, peer: &PeerId) -> bool;

    /// Returns the peers with live connections.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Sends a request and awaits the response within `timeout`.
    ///
    /// Dials the peer first if no connection exists.
    async fn send_request(
        &self,
        peer: &PeerId,
        request: DhtMessage,
        timeout: Duration,
    ) -> Result<DhtMessage, HostError>;
}
