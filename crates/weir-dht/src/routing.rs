//! Kademlia routing table.
//!
//! Peers are organized into k-buckets by the length of the common prefix
//! between their keyspace position and the local peer's. Buckets are
//! allocated lazily: the table starts with a single bucket, and the last
//! bucket unfolds into a new one when it overflows, separating entries
//! that share a longer prefix with the local peer. A peer's bucket index
//! is therefore always `min(cpl(peer, self), buckets - 1)`.
//!
//! Buckets hold at most k peers in recency order (least recently seen at
//! the front). When a full bucket cannot unfold further, the newcomer
//! replaces the least recently seen entry only if that entry fails the
//! injected liveness probe; otherwise the newcomer is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use weir_core::{cpl, KeyDigest, PeerId};

/// Widest possible table: one bucket per digest bit.
const MAX_BUCKETS: usize = 256;

/// Callback probing whether a peer is still reachable.
///
/// Injected at construction so the table never reaches back into the DHT;
/// the engine wires this to host connectivity.
pub type LivenessProbe = Arc<dyn Fn(&PeerId) -> bool + Send + Sync>;

#[derive(Default)]
struct Bucket {
    /// Recency order: least recently seen first.
    peers: VecDeque<PeerId>,
}

/// The routing table.
pub struct RoutingTable {
    local: PeerId,
    local_digest: KeyDigest,
    k: usize,
    probe: LivenessProbe,
    buckets: RwLock<Vec<Bucket>>,
}

impl RoutingTable {
    /// Creates a table for the given local peer.
    pub fn new(local: PeerId, k: usize, probe: LivenessProbe) -> Self {
        Self {
            local,
            local_digest: local.digest(),
            k,
            probe,
            buckets: RwLock::new(vec![Bucket::default()]),
        }
    }

    /// Returns the local peer id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Records that a peer was seen.
    ///
    /// Moves known peers to the most-recently-seen position; inserts new
    /// peers, evicting an unresponsive LRU entry if the bucket is full.
    /// Returns true if the peer is in the table afterwards.
    pub fn update(&self, id: PeerId) -> bool {
        if id == self.local {
            return false;
        }
        let peer_cpl = cpl(&id.digest(), &self.local_digest) as usize;
        let mut buckets = self.buckets.write();

        loop {
            let idx = peer_cpl.min(buckets.len() - 1);

            if let Some(pos) = buckets[idx].peers.iter().position(|p| *p == id) {
                buckets[idx].peers.remove(pos);
                buckets[idx].peers.push_back(id);
                return true;
            }

            if buckets[idx].peers.len() < self.k {
                buckets[idx].peers.push_back(id);
                return true;
            }

            // A full last bucket unfolds into a new one; the newcomer is
            // then retried against the narrower layout.
            if idx == buckets.len() - 1 && buckets.len() < MAX_BUCKETS {
                Self::unfold(&self.local_digest, &mut buckets);
                continue;
            }

            let Some(&lru) = buckets[idx].peers.front() else {
                return false;
            };
            if !(self.probe)(&lru) {
                buckets[idx].peers.pop_front();
                buckets[idx].peers.push_back(id);
                debug!(evicted = %lru, added = %id, bucket = idx, "replaced unresponsive peer");
                return true;
            }
            return false;
        }
    }

    fn unfold(local_digest: &KeyDigest, buckets: &mut Vec<Bucket>) {
        buckets.push(Bucket::default());
        let new_last = buckets.len() - 1;
        let old_last = new_last - 1;

        let moved: Vec<PeerId> = buckets[old_last]
            .peers
            .iter()
            .copied()
            .filter(|p| cpl(&p.digest(), local_digest) as usize >= new_last)
            .collect();
        buckets[old_last].peers.retain(|p| !moved.contains(p));
        buckets[new_last].peers.extend(moved);
    }

    /// Removes a peer from the table.
    pub fn remove(&self, id: &PeerId) {
        let peer_cpl = cpl(&id.digest(), &self.local_digest) as usize;
        let mut buckets = self.buckets.write();
        let idx = peer_cpl.min(buckets.len() - 1);
        if let Some(pos) = buckets[idx].peers.iter().position(|p| p == id) {
            buckets[idx].peers.remove(pos);
        }
    }

    /// Returns true if the peer is present.
    pub fn contains(&self, id: &PeerId) -> bool {
        let peer_cpl = cpl(&id.digest(), &self.local_digest) as usize;
        let buckets = self.buckets.read();
        let idx = peer_cpl.min(buckets.len() - 1);
        buckets[idx].peers.contains(id)
    }

    /// Returns the `count` peers closest to `target` by XOR distance.
    ///
    /// Scans the bucket at the target's common prefix length first, then
    /// outward in both directions; ties are broken lexicographically on
    /// the id bytes.
    pub fn nearest(&self, target: &KeyDigest, count: usize) -> Vec<PeerId> {
        let buckets = self.buckets.read();
        let center = (cpl(target, &self.local_digest) as usize).min(buckets.len() - 1);

        let mut candidates: Vec<PeerId> = Vec::new();
        candidates.extend(buckets[center].peers.iter().copied());
        let mut span = 1;
        while span <= center || center + span < buckets.len() {
            if span <= center {
                candidates.extend(buckets[center - span].peers.iter().copied());
            }
            if center + span < buckets.len() {
                candidates.extend(buckets[center + span].peers.iter().copied());
            }
            span += 1;
        }
        drop(buckets);

        candidates.sort_by_cached_key(|p| (target.xor_distance(&p.digest()), *p));
        candidates.truncate(count);
        candidates
    }

    /// Returns the number of peers in the table.
    pub fn size(&self) -> usize {
        self.buckets.read().iter().map(|b| b.peers.len()).sum()
    }

    /// Returns every peer in the table.
    pub fn peers(&self) -> Vec<PeerId> {
        self.buckets
            .read()
            .iter()
            .flat_map(|b| b.peers.iter().copied())
            .collect()
    }

    /// Returns the number of allocated buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    #[cfg(test)]
    fn bucket_of(&self, id: &PeerId) -> Option<usize> {
        let buckets = self.buckets.read();
        buckets.iter().position(|b| b.peers.contains(id))
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("local", &self.local)
            .field("size", &self.size())
            .field("buckets", &self.bucket_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_alive() -> LivenessProbe {
        Arc::new(|_| true)
    }

    fn always_dead() -> LivenessProbe {
        Arc::new(|_| false)
    }

    /// Finds a random peer whose digest shares exactly `want` leading bits
    /// with `local`'s digest. Cheap for small `want`.
    fn id_with_cpl(local: &PeerId, want: u32) -> PeerId {
        let local_digest = local.digest();
        loop {
            let id = PeerId::random();
            if id != *local && cpl(&id.digest(), &local_digest) == want {
                return id;
            }
        }
    }

    #[test]
    fn test_rejects_local_id() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 20, always_alive());
        assert!(!table.update(local));
        assert_eq!(table.size(), 0);
    }

    #[test]
    fn test_bucket_invariant() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 4, always_alive());

        let mut inserted = Vec::new();
        for _ in 0..200 {
            let id = PeerId::random();
            if table.update(id) {
                inserted.push(id);
            }
        }

        let local_digest = local.digest();
        let max_idx = table.bucket_count() - 1;
        for id in table.peers() {
            let expected = (cpl(&id.digest(), &local_digest) as usize).min(max_idx);
            assert_eq!(table.bucket_of(&id), Some(expected));
        }
    }

    #[test]
    fn test_update_moves_to_mru() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 2, always_dead());

        let a = id_with_cpl(&local, 0);
        let b = id_with_cpl(&local, 0);
        let c = id_with_cpl(&local, 0);
        assert!(table.update(a));
        assert!(table.update(b));
        // Refresh a; b becomes the LRU and is the one evicted below.
        assert!(table.update(a));

        assert!(table.update(c));
        assert!(!table.contains(&b), "LRU entry should have been evicted");
        assert!(table.contains(&a));
        assert!(table.contains(&c));
    }

    #[test]
    fn test_full_bucket_keeps_live_lru() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 2, always_alive());

        // cpl 0 entries never move on unfold, so the bucket genuinely fills.
        let a = id_with_cpl(&local, 0);
        let b = id_with_cpl(&local, 0);
        let c = id_with_cpl(&local, 0);
        table.update(a);
        table.update(b);

        assert!(!table.update(c), "newcomer dropped when LRU is alive");
        assert!(table.contains(&a));
        assert!(table.contains(&b));
        assert!(!table.contains(&c));
    }

    #[test]
    fn test_eviction_probes_lru() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let probed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probed);
        let probe: LivenessProbe = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });

        let local = PeerId::random();
        let table = RoutingTable::new(local, 1, probe);

        let a = id_with_cpl(&local, 0);
        let b = id_with_cpl(&local, 0);
        table.update(a);
        assert!(table.update(b));
        assert_eq!(probed.load(Ordering::SeqCst), 1);
        assert!(!table.contains(&a));
    }

    #[test]
    fn test_remove() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 20, always_alive());
        let id = PeerId::random();

        table.update(id);
        assert!(table.contains(&id));
        table.remove(&id);
        assert!(!table.contains(&id));
        assert_eq!(table.size(), 0);
    }

    #[test]
    fn test_nearest_monotonic() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 20, always_alive());
        for _ in 0..100 {
            table.update(PeerId::random());
        }

        let target = weir_core::Key::from("some key").digest();
        let nearest = table.nearest(&target, 10);
        assert!(nearest.len() <= 10);

        for pair in nearest.windows(2) {
            let d0 = target.xor_distance(&pair[0].digest());
            let d1 = target.xor_distance(&pair[1].digest());
            assert!(d0 <= d1, "nearest() must be sorted by distance");
        }
    }

    #[test]
    fn test_nearest_is_globally_closest() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 20, always_alive());

        let mut all = Vec::new();
        for _ in 0..60 {
            let id = PeerId::random();
            if table.update(id) {
                all.push(id);
            }
        }

        let target = weir_core::Key::from("another key").digest();
        let got = table.nearest(&target, 5);

        all.sort_by_cached_key(|p| (target.xor_distance(&p.digest()), *p));
        all.truncate(5);
        assert_eq!(got, all);
    }

    #[test]
    fn test_lazy_bucket_allocation() {
        let local = PeerId::random();
        let table = RoutingTable::new(local, 2, always_alive());
        assert_eq!(table.bucket_count(), 1);

        for _ in 0..50 {
            table.update(PeerId::random());
        }
        assert!(table.bucket_count() > 1, "overflow should unfold buckets");
    }
}
