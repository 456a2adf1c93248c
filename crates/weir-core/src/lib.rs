//! Weir Core - identifier, keyspace and encoding primitives for the weir
//! peer-to-peer overlay.
//!
//! This crate provides:
//! - 32-byte identifier types (`PeerId`, `Cid`, `KeyDigest`) and the opaque
//!   record `Key`
//! - The XOR keyspace metric used by the routing layer
//! - Canonical encoding for deterministic serialization
//! - Timestamps and ed25519 signing helpers

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod encoding;
pub mod identifiers;
pub mod keyspace;
pub mod signing;
pub mod time;

pub use encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
pub use identifiers::{Cid, Distance, Key, KeyDigest, PeerId};
pub use keyspace::cpl;
pub use signing::{verify_signature, Keypair, SignatureError};
pub use time::Timestamp;

/// Number of bits in an identifier digest.
pub const DIGEST_BITS: u32 = 256;

/// Default maximum bucket size (k).
pub const DEFAULT_K: usize = 20;

/// Default lookup fanout (alpha).
pub const DEFAULT_ALPHA: usize = 3;
