//! Identifier types for the weir overlay.
//!
//! Three 32-byte identifiers share a common implementation:
//! - `PeerId` - peer identity, BLAKE3(public key)
//! - `Cid` - content address of a DAG node, BLAKE3(canonical encoding)
//! - `KeyDigest` - keyspace position of a record key, BLAKE3(key bytes)
//!
//! Record keys themselves are opaque byte strings (`Key`), optionally
//! namespaced as `/<ns>/<suffix>`.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};

/// Macro to define a 32-byte identifier type with common implementations.
macro_rules! define_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Creates a new identifier from a 32-byte array.
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Creates a zero identifier.
            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            /// Returns the inner bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Creates from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Returns as a hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Computes the XOR distance to another identifier of the same kind.
            pub fn xor_distance(&self, other: &Self) -> Distance {
                let mut result = [0u8; 32];
                for i in 0..32 {
                    result[i] = self.0[i] ^ other.0[i];
                }
                Distance(result)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl CanonicalEncode for $name {
            fn encode(&self, buf: &mut BytesMut) {
                self.0.encode(buf);
            }
        }

        impl CanonicalDecode for $name {
            fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
                Ok(Self(<[u8; 32]>::decode(buf)?))
            }
        }
    };
}

define_id_type!(
    /// Peer identity, derived as BLAKE3(public_key).
    PeerId
);

define_id_type!(
    /// Content address of an immutable DAG node.
    Cid
);

define_id_type!(
    /// Position of a record key in the XOR keyspace.
    KeyDigest
);

impl PeerId {
    /// Derives a peer id from an ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self(*blake3::hash(public_key).as_bytes())
    }

    /// Generates a random peer id.
    ///
    /// Used for random-key bootstrap lookups and tests.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns this peer's position in the keyspace.
    pub fn digest(&self) -> KeyDigest {
        KeyDigest(*blake3::hash(&self.0).as_bytes())
    }
}

impl Cid {
    /// Computes the content address of a canonically encoded node.
    pub fn from_encoded(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

/// XOR distance between two keyspace digests.
///
/// Ordered as an unsigned big-endian integer, which coincides with the
/// derived lexicographic ordering on the bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(pub [u8; 32]);

impl Distance {
    /// The zero distance.
    pub const ZERO: Distance = Distance([0u8; 32]);

    /// Returns the number of leading zero bits.
    pub fn leading_zeros(&self) -> u32 {
        let mut zeros = 0u32;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl fmt::Debug for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({})", &hex::encode(self.0)[..16])
    }
}

/// An opaque record key.
///
/// Keys may be namespaced as `/<ns>/<suffix>`; the namespace selects the
/// record validator responsible for the key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(Bytes);

impl Key {
    /// Creates a key from raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the raw key bytes as a cheaply cloned `Bytes`.
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Returns the key's position in the keyspace.
    pub fn digest(&self) -> KeyDigest {
        KeyDigest(*blake3::hash(&self.0).as_bytes())
    }

    /// Splits a `/<ns>/<suffix>` key into namespace and suffix.
    ///
    /// Returns `None` for keys that do not follow the namespace form.
    pub fn split_namespace(&self) -> Option<(&str, &[u8])> {
        let bytes: &[u8] = &self.0;
        if bytes.first() != Some(&b'/') {
            return None;
        }
        let rest = &bytes[1..];
        let sep = rest.iter().position(|&b| b == b'/')?;
        let ns = std::str::from_utf8(&rest[..sep]).ok()?;
        if ns.is_empty() {
            return None;
        }
        Some((ns, &rest[sep + 1..]))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "Key({:?})", s),
            Err(_) => write!(f, "Key(0x{})", hex::encode(&self.0)),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl CanonicalEncode for Key {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf);
    }
}

impl CanonicalDecode for Key {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self(Bytes::decode(buf)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_distance() {
        let a = PeerId::new([0xFF; 32]);
        let b = PeerId::new([0x00; 32]);
        assert_eq!(a.xor_distance(&b).0, [0xFF; 32]);
        assert_eq!(a.xor_distance(&a), Distance::ZERO);
    }

    #[test]
    fn test_distance_ordering() {
        let target = KeyDigest::new([0x00; 32]);

        let mut near = [0x00; 32];
        near[31] = 0x01;
        let mut far = [0x00; 32];
        far[0] = 0x80;

        let d_near = target.xor_distance(&KeyDigest::new(near));
        let d_far = target.xor_distance(&KeyDigest::new(far));
        assert!(d_near < d_far);
    }

    #[test]
    fn test_distance_leading_zeros() {
        assert_eq!(Distance::ZERO.leading_zeros(), 256);

        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        assert_eq!(Distance(bytes).leading_zeros(), 0);

        bytes[0] = 0x01;
        assert_eq!(Distance(bytes).leading_zeros(), 7);

        bytes = [0u8; 32];
        bytes[1] = 0x40;
        assert_eq!(Distance(bytes).leading_zeros(), 9);
    }

    #[test]
    fn test_key_namespace() {
        let key = Key::from("/v/hello");
        assert_eq!(key.split_namespace(), Some(("v", &b"hello"[..])));

        let key = Key::from("/pk/somepeer");
        assert_eq!(key.split_namespace(), Some(("pk", &b"somepeer"[..])));

        assert_eq!(Key::from("hello").split_namespace(), None);
        assert_eq!(Key::from("/noslash").split_namespace(), None);
        assert_eq!(Key::from("//x").split_namespace(), None);
    }

    #[test]
    fn test_key_digest_stable() {
        let a = Key::from("/v/hello");
        let b = Key::from("/v/hello");
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), Key::from("/v/world").digest());
    }

    #[test]
    fn test_peer_id_from_public_key() {
        let pk = [0x42u8; 32];
        let id = PeerId::from_public_key(&pk);
        assert_eq!(id, PeerId::from_public_key(&pk));
        assert_ne!(id, PeerId::new(pk));
    }

    #[test]
    fn test_id_hex_roundtrip() {
        let id = PeerId::random();
        let parsed = PeerId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_key_canonical_roundtrip() {
        let key = Key::from("/v/hello");
        let encoded = key.to_vec();
        let decoded = Key::from_bytes(&encoded).unwrap();
        assert_eq!(key, decoded);
    }
}
