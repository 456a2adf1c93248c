//! Local record storage.
//!
//! Acceptance is gated by the key's namespace validator; accepted records
//! are persisted in the collaborator datastore under a fixed prefix so
//! their layout is keyed purely by digest.

use std::sync::Arc;

use weir_core::{CanonicalDecode, CanonicalEncode, Key};
use weir_proto::Record;
use weir_store::Datastore;

use crate::error::DhtError;
use crate::validator::ValidatorRegistry;

const RECORD_PREFIX: &str = "/records/";

/// Validator-gated record store over a flat datastore.
pub struct RecordStore {
    datastore: Arc<dyn Datastore>,
    validators: Arc<ValidatorRegistry>,
}

impl RecordStore {
    /// Creates a store over the given datastore and validator registry.
    pub fn new(datastore: Arc<dyn Datastore>, validators: Arc<ValidatorRegistry>) -> Self {
        Self {
            datastore,
            validators,
        }
    }

    fn datastore_key(key: &Key) -> Vec<u8> {
        let mut out = RECORD_PREFIX.as_bytes().to_vec();
        out.extend_from_slice(key.digest().to_hex().as_bytes());
        out
    }

    /// Validates and stores a record, replacing any previous one.
    pub fn put(&self, key: &Key, record: &Record) -> Result<(), DhtError> {
        self.validators.validate(key, record)?;
        self.datastore
            .put(&Self::datastore_key(key), record.to_bytes())?;
        Ok(())
    }

    /// Returns the record stored under `key`, if any.
    pub fn get(&self, key: &Key) -> Result<Option<Record>, DhtError> {
        let Some(bytes) = self.datastore.get(&Self::datastore_key(key))? else {
            return Ok(None);
        };
        let record = Record::from_bytes(&bytes)
            .map_err(|e| DhtError::InvalidRecord(format!("stored record corrupt: {e}")))?;
        Ok(Some(record))
    }

    /// Removes the record stored under `key`.
    pub fn delete(&self, key: &Key) -> Result<(), DhtError> {
        self.datastore.delete(&Self::datastore_key(key))?;
        Ok(())
    }
}
