//! Signed DHT records.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use weir_core::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
use weir_core::{Key, PeerId, Timestamp};

/// A record stored in the DHT under an opaque key.
///
/// Records are validated by the namespace's validator before acceptance;
/// for signed namespaces the signature covers [`Record::signable_bytes`]
/// and is verified against the declared author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The key this record is stored under.
    pub key: Key,
    /// The record value.
    pub value: Bytes,
    /// The peer that authored the record.
    pub author: PeerId,
    /// Signature over [`Record::signable_bytes`]; empty for unsigned
    /// namespaces.
    pub signature: Bytes,
    /// Authoring time, used by the default best-record policy.
    pub timestamp: Timestamp,
}

impl Record {
    /// Creates an unsigned record stamped with the current time.
    pub fn new(key: Key, value: Bytes, author: PeerId) -> Self {
        Self {
            key,
            value,
            author,
            signature: Bytes::new(),
            timestamp: Timestamp::now(),
        }
    }

    /// Returns the bytes covered by the record signature: everything
    /// except the signature itself.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.key.encode(&mut buf);
        self.value.encode(&mut buf);
        self.author.encode(&mut buf);
        self.timestamp.encode(&mut buf);
        buf.to_vec()
    }
}

impl CanonicalEncode for Record {
    fn encode(&self, buf: &mut BytesMut) {
        self.key.encode(buf);
        self.value.encode(buf);
        self.author.encode(buf);
        self.signature.encode(buf);
        self.timestamp.encode(buf);
    }
}

impl CanonicalDecode for Record {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            key: Key::decode(buf)?,
            value: Bytes::decode(buf)?,
            author: PeerId::decode(buf)?,
            signature: Bytes::decode(buf)?,
            timestamp: Timestamp::decode(buf)?,
        })
    }
}
