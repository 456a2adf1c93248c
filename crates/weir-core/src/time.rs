//! Timestamps for record metadata and provider bookkeeping.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::encoding::{CanonicalDecode, CanonicalEncode, DecodeError};

/// Milliseconds since the Unix epoch.
///
/// Used for record timestamps (best-record selection) and provider entry
/// expiry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self(duration.as_millis() as i64)
    }

    /// Returns the milliseconds since the Unix epoch.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Adds a duration, saturating on overflow.
    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as i64))
    }

    /// Subtracts a duration, saturating on underflow.
    pub fn sub(&self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_millis() as i64))
    }

    /// Returns the duration elapsed since `earlier`, or `None` if `earlier`
    /// is in the future.
    pub fn duration_since(&self, earlier: &Timestamp) -> Option<Duration> {
        if self.0 >= earlier.0 {
            Some(Duration::from_millis((self.0 - earlier.0) as u64))
        } else {
            None
        }
    }
}

impl CanonicalEncode for Timestamp {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf);
    }
}

impl CanonicalDecode for Timestamp {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self(i64::decode(buf)?))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let ts = Timestamp::now();
        // After 2024-01-01.
        assert!(ts.0 > 1_704_067_200_000);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let ts = Timestamp::new(1_000_000);
        assert_eq!(ts.add(Duration::from_millis(5000)).0, 1_005_000);
        assert_eq!(ts.sub(Duration::from_millis(5000)).0, 995_000);
    }

    #[test]
    fn test_duration_since() {
        let earlier = Timestamp::new(1_000_000);
        let later = Timestamp::new(1_005_000);
        assert_eq!(
            later.duration_since(&earlier),
            Some(Duration::from_millis(5000))
        );
        assert_eq!(earlier.duration_since(&later), None);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Timestamp::new(1_700_000_000_000);
        let decoded = Timestamp::from_bytes(&ts.to_vec()).unwrap();
        assert_eq!(ts, decoded);
    }
}
