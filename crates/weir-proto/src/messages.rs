//! DHT wire messages and framing.
//!
//! The protocol has exactly six message kinds; requests and responses share
//! one schema. Every response carries up to k peers closer to the request
//! key so that iterative lookups converge. Frames are u32 length-prefixed
//! canonical encodings.

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use weir_core::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};
use weir_core::PeerId;

use crate::record::Record;

/// Maximum accepted frame size. Records are small; anything larger is a
/// protocol violation.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// The six DHT RPC message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum MessageKind {
    /// Liveness check; the response echoes the request.
    Ping = 0,
    /// Request the k peers closest to a target key.
    FindNode = 1,
    /// Request the record stored under a key.
    GetValue = 2,
    /// Store a record on the receiver.
    PutValue = 3,
    /// Announce the sender as a provider for a key.
    AddProvider = 4,
    /// Request the providers known for a key.
    GetProviders = 5,
}

impl MessageKind {
    /// Returns the tag value.
    pub const fn tag(&self) -> u32 {
        *self as u32
    }

    /// Creates from a tag value. Unknown kinds are errors.
    pub fn from_tag(tag: u32) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(MessageKind::Ping),
            1 => Ok(MessageKind::FindNode),
            2 => Ok(MessageKind::GetValue),
            3 => Ok(MessageKind::PutValue),
            4 => Ok(MessageKind::AddProvider),
            5 => Ok(MessageKind::GetProviders),
            _ => Err(DecodeError::InvalidEnumTag(tag)),
        }
    }
}

/// A peer reference carried in messages: id plus dialable addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Peer identifier.
    pub id: PeerId,
    /// Multi-addresses the peer is reachable on.
    pub addrs: Vec<String>,
}

impl CanonicalEncode for PeerEntry {
    fn encode(&self, buf: &mut BytesMut) {
        self.id.encode(buf);
        self.addrs.encode(buf);
    }
}

impl CanonicalDecode for PeerEntry {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            id: PeerId::decode(buf)?,
            addrs: Vec::<String>::decode(buf)?,
        })
    }
}

/// A DHT message. One schema serves requests and responses; unused fields
/// stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhtMessage {
    /// Message kind.
    pub kind: MessageKind,
    /// The key the request concerns; empty for `Ping`.
    pub key: Bytes,
    /// The record being stored (`PutValue`) or returned (`GetValue`).
    pub record: Option<Record>,
    /// Providers being announced (`AddProvider`) or returned
    /// (`GetProviders`).
    pub provider_peers: Vec<PeerEntry>,
    /// Peers closer to the request key, carried on every response.
    pub closer_peers: Vec<PeerEntry>,
    /// Federation level passthrough; unused by the core and echoed as-is.
    pub cluster_level: u32,
}

impl DhtMessage {
    /// Creates a request of the given kind for a key.
    pub fn request(kind: MessageKind, key: impl Into<Bytes>) -> Self {
        Self {
            kind,
            key: key.into(),
            record: None,
            provider_peers: Vec::new(),
            closer_peers: Vec::new(),
            cluster_level: 0,
        }
    }

    /// Creates a response to a request, echoing kind, key and level.
    pub fn response_to(request: &DhtMessage) -> Self {
        Self {
            kind: request.kind,
            key: request.key.clone(),
            record: None,
            provider_peers: Vec::new(),
            closer_peers: Vec::new(),
            cluster_level: request.cluster_level,
        }
    }
}

impl CanonicalEncode for DhtMessage {
    fn encode(&self, buf: &mut BytesMut) {
        self.kind.tag().encode(buf);
        self.key.encode(buf);
        self.record.encode(buf);
        self.provider_peers.encode(buf);
        self.closer_peers.encode(buf);
        self.cluster_level.encode(buf);
    }
}

impl CanonicalDecode for DhtMessage {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            kind: MessageKind::from_tag(u32::decode(buf)?)?,
            key: Bytes::decode(buf)?,
            record: Option::<Record>::decode(buf)?,
            provider_peers: Vec::<PeerEntry>::decode(buf)?,
            closer_peers: Vec::<PeerEntry>::decode(buf)?,
            cluster_level: u32::decode(buf)?,
        })
    }
}

/// Length-prefixed message framing.
pub struct MessageCodec;

impl MessageCodec {
    /// Encodes a message as a u32 length-prefixed frame.
    pub fn encode_frame(message: &DhtMessage) -> Bytes {
        let body = message.to_bytes();
        let mut frame = BytesMut::with_capacity(4 + body.len());
        (body.len() as u32).encode(&mut frame);
        frame.extend_from_slice(&body);
        frame.freeze()
    }

    /// Decodes one frame from the front of `buf`, consuming it.
    ///
    /// Returns `Ok(None)` while the buffer holds less than a full frame.
    pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<DhtMessage>, DecodeError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(DecodeError::FrameTooLarge(len));
        }
        if buf.len() < 4 + len {
            return Ok(None);
        }
        buf.advance(4);
        let mut body = buf.split_to(len).freeze();
        let message = DhtMessage::decode(&mut body)?;
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::Key;

    fn sample_message() -> DhtMessage {
        let mut msg = DhtMessage::request(MessageKind::GetProviders, Key::from("/v/hello").as_bytes().to_vec());
        msg.provider_peers.push(PeerEntry {
            id: PeerId::random(),
            addrs: vec!["/mem/0001".to_string()],
        });
        msg.closer_peers.push(PeerEntry {
            id: PeerId::random(),
            addrs: vec![],
        });
        msg
    }

    #[test]
    fn test_frame_roundtrip() {
        let msg = sample_message();
        let frame = MessageCodec::encode_frame(&msg);

        let mut buf = BytesMut::from(&frame[..]);
        let decoded = MessageCodec::decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(msg, decoded);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits() {
        let frame = MessageCodec::encode_frame(&sample_message());

        let mut buf = BytesMut::from(&frame[..frame.len() - 1]);
        assert!(MessageCodec::decode_frame(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&frame[frame.len() - 1..]);
        assert!(MessageCodec::decode_frame(&mut buf).unwrap().is_some());
    }

    #[test]
    fn test_two_frames_in_buffer() {
        let a = DhtMessage::request(MessageKind::Ping, Bytes::new());
        let b = sample_message();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&MessageCodec::encode_frame(&a));
        buf.extend_from_slice(&MessageCodec::encode_frame(&b));

        assert_eq!(MessageCodec::decode_frame(&mut buf).unwrap().unwrap(), a);
        assert_eq!(MessageCodec::decode_frame(&mut buf).unwrap().unwrap(), b);
        assert!(MessageCodec::decode_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buf = BytesMut::new();
        ((MAX_FRAME_SIZE + 1) as u32).encode(&mut buf);
        assert!(matches!(
            MessageCodec::decode_frame(&mut buf),
            Err(DecodeError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let msg = sample_message();
        let mut body = msg.to_bytes().to_vec();
        // Corrupt the kind tag.
        body[0] = 0xEE;
        assert!(matches!(
            DhtMessage::from_bytes(&body),
            Err(DecodeError::InvalidEnumTag(_))
        ));
    }

    #[test]
    fn test_response_echoes_request() {
        let req = DhtMessage::request(MessageKind::GetValue, Bytes::from_static(b"/v/k"));
        let resp = DhtMessage::response_to(&req);
        assert_eq!(resp.kind, MessageKind::GetValue);
        assert_eq!(resp.key, req.key);
        assert_eq!(resp.cluster_level, req.cluster_level);
    }
}
