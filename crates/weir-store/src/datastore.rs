//! Flat key/value datastore used for record persistence.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::StoreError;

/// A flat byte-keyed datastore.
///
/// The DHT record store persists validated records here under the
/// `/records/` prefix; implementations only need get/put/delete.
pub trait Datastore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: Bytes) -> Result<(), StoreError>;

    /// Returns the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    /// Deletes the value stored under `key`, if present.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;
}

/// In-memory datastore.
#[derive(Default)]
pub struct MemDatastore {
    entries: RwLock<HashMap<Vec<u8>, Bytes>>,
}

impl MemDatastore {
    /// Creates an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the datastore is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Datastore for MemDatastore {
    fn put(&self, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemDatastore::new();
        let key = b"/records/abcd";

        assert_eq!(store.get(key).unwrap(), None);

        store.put(key, Bytes::from_static(b"v1")).unwrap();
        assert_eq!(store.get(key).unwrap(), Some(Bytes::from_static(b"v1")));

        store.put(key, Bytes::from_static(b"v2")).unwrap();
        assert_eq!(store.get(key).unwrap(), Some(Bytes::from_static(b"v2")));

        store.delete(key).unwrap();
        assert_eq!(store.get(key).unwrap(), None);
    }
}
