//! Ed25519 signing helpers for record authentication.
//!
//! The overlay does not mandate a signing scheme; this module provides the
//! default one used by the signed-record validator. A peer's identity is
//! the BLAKE3 hash of its verifying key.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use thiserror::Error;

use crate::identifiers::PeerId;

/// Signature verification errors.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The public key bytes are not a valid ed25519 point.
    #[error("malformed public key")]
    MalformedPublicKey,

    /// The signature bytes are malformed.
    #[error("malformed signature")]
    MalformedSignature,

    /// The signature does not verify against the message.
    #[error("signature verification failed")]
    Invalid,
}

/// An ed25519 keypair identifying a peer.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Restores a keypair from its 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(bytes),
        }
    }

    /// Returns the public (verifying) key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Returns the peer id derived from the public key.
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public_key())
    }

    /// Signs a message, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair({})", self.peer_id())
    }
}

/// Verifies an ed25519 signature against a public key.
pub fn verify_signature(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let key =
        VerifyingKey::from_bytes(public_key).map_err(|_| SignatureError::MalformedPublicKey)?;
    let sig = Signature::from_slice(signature).map_err(|_| SignatureError::MalformedSignature)?;
    key.verify_strict(message, &sig)
        .map_err(|_| SignatureError::Invalid)
}
