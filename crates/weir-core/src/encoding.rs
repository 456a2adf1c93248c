//! Canonical encoding for deterministic serialization.
//!
//! Everything that participates in content addressing or signing must
//! encode to the same bytes everywhere, so all wire and DAG structures go
//! through this scheme rather than an ambient serializer.
//!
//! Rules:
//! - Integers: little-endian
//! - Fixed arrays: elements back to back, no length prefix
//! - Variable sequences and byte strings: u32 length prefix
//! - Strings: u32 byte length followed by UTF-8 bytes
//! - Options: 0x00 for None, 0x01 + value for Some

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Errors during canonical decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes to decode
    #[error("insufficient bytes: expected {expected}, got {available}")]
    InsufficientBytes {
        /// Expected number of bytes
        expected: usize,
        /// Actually available bytes
        available: usize,
    },

    /// Invalid UTF-8 string
    #[error("invalid UTF-8 string: {0}")]
    InvalidUtf8(String),

    /// Invalid enum tag
    #[error("invalid enum tag: {0}")]
    InvalidEnumTag(u32),

    /// Frame exceeds the maximum allowed size
    #[error("frame of {0} bytes exceeds maximum")]
    FrameTooLarge(usize),
}

/// Trait for types that can be canonically encoded.
pub trait CanonicalEncode {
    /// Encodes the value into the buffer.
    fn encode(&self, buf: &mut BytesMut);

    /// Returns the encoded byte representation.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Returns the encoded byte representation as a Vec.
    fn to_vec(&self) -> Vec<u8> {
        self.to_bytes().as_ref().to_vec()
    }
}

/// Trait for types that can be decoded from canonical encoding.
pub trait CanonicalDecode: Sized {
    /// Decodes from canonical byte representation, advancing the buffer.
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError>;

    /// Decodes from a byte slice.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = Bytes::copy_from_slice(bytes);
        Self::decode(&mut buf)
    }
}

fn ensure(buf: &Bytes, needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::InsufficientBytes {
            expected: needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

impl CanonicalEncode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(*self);
    }
}

impl CanonicalDecode for u8 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 1)?;
        Ok(buf.get_u8())
    }
}

impl CanonicalEncode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(*self);
    }
}

impl CanonicalDecode for u32 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 4)?;
        Ok(buf.get_u32_le())
    }
}

impl CanonicalEncode for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(*self);
    }
}

impl CanonicalDecode for u64 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 8)?;
        Ok(buf.get_u64_le())
    }
}

impl CanonicalEncode for i64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64_le(*self);
    }
}

impl CanonicalDecode for i64 {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, 8)?;
        Ok(buf.get_i64_le())
    }
}

impl<const N: usize> CanonicalEncode for [u8; N] {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }
}

impl<const N: usize> CanonicalDecode for [u8; N] {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        ensure(buf, N)?;
        let mut arr = [0u8; N];
        buf.copy_to_slice(&mut arr);
        Ok(arr)
    }
}

impl<T: CanonicalEncode> CanonicalEncode for Vec<T> {
    fn encode(&self, buf: &mut BytesMut) {
        debug_assert!(self.len() <= u32::MAX as usize);
        (self.len() as u32).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<T: CanonicalDecode> CanonicalDecode for Vec<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        let mut vec = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            vec.push(T::decode(buf)?);
        }
        Ok(vec)
    }
}

impl CanonicalEncode for Bytes {
    fn encode(&self, buf: &mut BytesMut) {
        debug_assert!(self.len() <= u32::MAX as usize);
        (self.len() as u32).encode(buf);
        buf.put_slice(self);
    }
}

impl CanonicalDecode for Bytes {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        Ok(buf.copy_to_bytes(len))
    }
}

impl CanonicalEncode for String {
    fn encode(&self, buf: &mut BytesMut) {
        let bytes = self.as_bytes();
        debug_assert!(bytes.len() <= u32::MAX as usize);
        (bytes.len() as u32).encode(buf);
        buf.put_slice(bytes);
    }
}

impl CanonicalDecode for String {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let len = u32::decode(buf)? as usize;
        ensure(buf, len)?;
        let bytes = buf.copy_to_bytes(len);
        String::from_utf8(bytes.as_ref().to_vec()).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))
    }
}

impl<T: CanonicalEncode> CanonicalEncode for Option<T> {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            None => buf.put_u8(0x00),
            Some(value) => {
                buf.put_u8(0x01);
                value.encode(buf);
            }
        }
    }
}

impl<T: CanonicalDecode> CanonicalDecode for Option<T> {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            0x00 => Ok(None),
            0x01 => Ok(Some(T::decode(buf)?)),
            tag => Err(DecodeError::InvalidEnumTag(tag as u32)),
        }
    }
}
