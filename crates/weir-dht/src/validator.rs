//! Record validation.
//!
//! A record key's namespace (`/<ns>/...`) selects the validator that gates
//! acceptance. Validators also own the "best record" policy used when a
//! lookup collects several candidates for one key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use weir_core::{verify_signature, Key, PeerId};
use weir_net::Peerstore;
use weir_proto::Record;

use crate::error::DhtError;

/// Validates records for one namespace.
pub trait RecordValidator: Send + Sync {
    /// Checks whether a record is acceptable under `key`.
    fn validate(&self, key: &Key, record: &Record) -> Result<(), DhtError>;

    /// Picks the index of the best record among validated candidates.
    ///
    /// The default policy prefers the most recent timestamp, breaking ties
    /// on the author id so every peer picks the same winner.
    fn select(&self, _key: &Key, records: &[Record]) -> usize {
        records
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.author.as_bytes().cmp(b.author.as_bytes()))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Returns true if records in this namespace must be signed.
    fn requires_signature(&self) -> bool {
        false
    }
}

/// Namespace to validator mapping.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<String, Arc<dyn RecordValidator>>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator for a namespace, replacing any previous one.
    pub fn register(&self, namespace: &str, validator: Arc<dyn RecordValidator>) {
        self.validators
            .write()
            .insert(namespace.to_string(), validator);
    }

    /// Resolves the validator for a key.
    ///
    /// Keys without a namespace, or with an unregistered one, have no
    /// validator and their records are rejected.
    pub fn lookup(&self, key: &Key) -> Result<Arc<dyn RecordValidator>, DhtError> {
        let (namespace, _) = key
            .split_namespace()
            .ok_or_else(|| DhtError::InvalidRecord(format!("key has no namespace: {key:?}")))?;
        self.validators
            .read()
            .get(namespace)
            .cloned()
            .ok_or_else(|| {
                DhtError::InvalidRecord(format!("no validator for namespace {namespace:?}"))
            })
    }

    /// Validates a record against the key's namespace validator.
    pub fn validate(&self, key: &Key, record: &Record) -> Result<(), DhtError> {
        if record.key != *key {
            return Err(DhtError::InvalidRecord(
                "record key does not match request key".to_string(),
            ));
        }
        self.lookup(key)?.validate(key, record)
    }

    /// Picks the best record for a key among validated candidates.
    pub fn select(&self, key: &Key, records: &[Record]) -> Result<usize, DhtError> {
        Ok(self.lookup(key)?.select(key, records))
    }
}

/// Accepts every record. Used for unsigned application namespaces and by
/// the test harness.
pub struct PermissiveValidator;

impl RecordValidator for PermissiveValidator {
    fn validate(&self, _key: &Key, _record: &Record) -> Result<(), DhtError> {
        Ok(())
    }
}

/// Verifies the record's ed25519 signature against its declared author.
///
/// The author's public key is resolved through the peerstore; records from
/// authors with no known key are rejected.
pub struct SignedValidator {
    peerstore: Arc<Peerstore>,
}

impl SignedValidator {
    /// Creates a validator resolving author keys from `peerstore`.
    pub fn new(peerstore: Arc<Peerstore>) -> Self {
        Self { peerstore }
    }
}

impl RecordValidator for SignedValidator {
    fn validate(&self, _key: &Key, record: &Record) -> Result<(), DhtError> {
        let public_key = self
            .peerstore
            .public_key(&record.author)
            .ok_or_else(|| DhtError::InvalidRecord(format!("unknown author {}", record.author)))?;
        if PeerId::from_public_key(&public_key) != record.author {
            return Err(DhtError::InvalidRecord(
                "author id does not match public key".to_string(),
            ));
        }
        verify_signature(&public_key, &record.signable_bytes(), &record.signature)
            .map_err(|e| DhtError::InvalidRecord(e.to_string()))
    }

    fn requires_signature(&self) -> bool {
        true
    }
}
