//! Provider bookkeeping.
//!
//! Peers announce that they hold content for a key; entries expire after
//! the provider TTL and are purged by a periodic sweep. Providers refresh
//! their own announcements on the reprovide interval.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;
use weir_core::{Key, PeerId, Timestamp};

/// A single provider announcement for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderEntry {
    /// The announcing peer.
    pub provider: PeerId,
    /// When the announcement was recorded locally.
    pub recorded_at: Timestamp,
}

/// Per-key provider sets with expiry.
pub struct ProviderStore {
    ttl: Duration,
    entries: RwLock<HashMap<Key, HashMap<PeerId, Timestamp>>>,
}

impl ProviderStore {
    /// Creates a store whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Records (or refreshes) a provider for a key.
    pub fn put(&self, key: &Key, provider: PeerId, now: Timestamp) {
        self.entries
            .write()
            .entry(key.clone())
            .or_default()
            .insert(provider, now);
    }

    /// Returns the unexpired providers for a key.
    pub fn get(&self, key: &Key, now: Timestamp) -> Vec<ProviderEntry> {
        let entries = self.entries.read();
        let Some(providers) = entries.get(key) else {
            return Vec::new();
        };
        providers
            .iter()
            .filter(|(_, recorded_at)| recorded_at.add(self.ttl) > now)
            .map(|(provider, recorded_at)| ProviderEntry {
                provider: *provider,
                recorded_at: *recorded_at,
            })
            .collect()
    }

    /// Purges expired entries and now-empty keys. Returns the number of
    /// entries removed.
    pub fn sweep(&self, now: Timestamp) -> usize {
        let mut entries = self.entries.write();
        let mut removed = 0;
        entries.retain(|_, providers| {
            let before = providers.len();
            providers.retain(|_, recorded_at| recorded_at.add(self.ttl) > now);
            removed += before - providers.len();
            !providers.is_empty()
        });
        if removed > 0 {
            debug!(removed, "swept expired provider entries");
        }
        removed
    }

    /// Returns the number of keys with at least one (possibly expired)
    /// entry.
    pub fn key_count(&self) -> usize {
        self.entries.read().len()
    }
}
