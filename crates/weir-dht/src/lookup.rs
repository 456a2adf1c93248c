//! Candidate bookkeeping for iterative lookups.
//!
//! [`Lookup`] tracks every peer heard of during one iterative query along
//! with its status. The driver in `dht.rs` owns concurrency (up to alpha
//! queries in flight on a task set); this type owns selection order and
//! convergence:
//!
//! - the next peer to query is always the fresh candidate closest to the
//!   target, ties broken lexicographically on the id;
//! - once k peers have answered, only candidates strictly closer than the
//!   closest responder are still worth querying;
//! - the lookup has converged when nothing is dispatchable and nothing is
//!   in flight.

use std::collections::HashMap;

use weir_core::{Distance, KeyDigest, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    Fresh,
    InFlight,
    Queried,
    Failed,
}

/// State of one iterative lookup.
pub(crate) struct Lookup {
    target: KeyDigest,
    local: PeerId,
    k: usize,
    states: HashMap<PeerId, PeerState>,
    distances: HashMap<PeerId, Distance>,
    queried: usize,
}

impl Lookup {
    /// Seeds a lookup with the locally known peers nearest the target.
    pub fn new(local: PeerId, target: KeyDigest, k: usize, seeds: Vec<PeerId>) -> Self {
        let mut lookup = Self {
            target,
            local,
            k,
            states: HashMap::new(),
            distances: HashMap::new(),
            queried: 0,
        };
        for peer in seeds {
            lookup.add_candidate(peer);
        }
        lookup
    }

    /// Adds a peer as a fresh candidate. The local peer and already-seen
    /// peers are skipped.
    pub fn add_candidate(&mut self, peer: PeerId) {
        if peer == self.local || self.states.contains_key(&peer) {
            return;
        }
        let distance = self.target.xor_distance(&peer.digest());
        self.states.insert(peer, PeerState::Fresh);
        self.distances.insert(peer, distance);
    }

    fn closest_queried_distance(&self) -> Option<Distance> {
        self.states
            .iter()
            .filter(|(_, s)| **s == PeerState::Queried)
            .map(|(p, _)| self.distances[p])
            .min()
    }

    fn best_fresh(&self) -> Option<(Distance, PeerId)> {
        self.states
            .iter()
            .filter(|(_, s)| **s == PeerState::Fresh)
            .map(|(p, _)| (self.distances[p], *p))
            .min()
    }

    /// Picks the next peer to query and marks it in flight.
    ///
    /// Returns `None` when the lookup has no dispatchable candidate: every
    /// fresh peer is farther than the closest responder and k peers have
    /// already answered, or no fresh peers remain.
    pub fn next_to_query(&mut self) -> Option<PeerId> {
        let (distance, peer) = self.best_fresh()?;
        if self.queried >= self.k {
            let closest = self.closest_queried_distance()?;
            if distance >= closest {
                return None;
            }
        }
        self.states.insert(peer, PeerState::InFlight);
        Some(peer)
    }

    /// Marks an in-flight peer as having answered.
    pub fn on_response(&mut self, peer: &PeerId) {
        if self.states.insert(*peer, PeerState::Queried) == Some(PeerState::InFlight) {
            self.queried += 1;
        }
    }

    /// Marks an in-flight peer as failed.
    pub fn on_failure(&mut self, peer: &PeerId) {
        self.states.insert(*peer, PeerState::Failed);
    }

    /// Returns the number of peers that have answered.
    pub fn queried_count(&self) -> usize {
        self.queried
    }

    /// Returns the `count` closest peers that answered, sorted by
    /// distance with lexicographic tie-break.
    pub fn closest_queried(&self, count: usize) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .states
            .iter()
            .filter(|(_, s)| **s == PeerState::Queried)
            .map(|(p, _)| *p)
            .collect();
        peers.sort_by_cached_key(|p| (self.distances[p], *p));
        peers.truncate(count);
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::Key;

    fn digest() -> KeyDigest {
        Key::from("target").digest()
    }

    #[test]
    fn test_selection_is_closest_first() {
        let target = digest();
        let local = PeerId::random();
        let seeds: Vec<PeerId> = (0..8).map(|_| PeerId::random()).collect();

        let mut sorted = seeds.clone();
        sorted.sort_by_cached_key(|p| (target.xor_distance(&p.digest()), *p));

        let mut lookup = Lookup::new(local, target, 20, seeds);
        for expected in &sorted {
            assert_eq!(lookup.next_to_query(), Some(*expected));
        }
        assert_eq!(lookup.next_to_query(), None);
    }

    #[test]
    fn test_local_and_duplicates_skipped() {
        let target = digest();
        let local = PeerId::random();
        let peer = PeerId::random();

        let mut lookup = Lookup::new(local, target, 20, vec![local, peer, peer]);
        assert_eq!(lookup.next_to_query(), Some(peer));
        assert_eq!(lookup.next_to_query(), None);

        // Re-adding a seen peer does not make it fresh again.
        lookup.add_candidate(peer);
        assert_eq!(lookup.next_to_query(), None);
    }

    #[test]
    fn test_response_updates_queried_set() {
        let target = digest();
        let local = PeerId::random();
        let peer = PeerId::random();

        let mut lookup = Lookup::new(local, target, 20, vec![peer]);
        let picked = lookup.next_to_query().unwrap();
        assert_eq!(lookup.queried_count(), 0);
        lookup.on_response(&picked);
        assert_eq!(lookup.queried_count(), 1);
        assert_eq!(lookup.closest_queried(20), vec![peer]);
    }

    #[test]
    fn test_failed_peers_excluded_from_result() {
        let target = digest();
        let local = PeerId::random();
        let good = PeerId::random();
        let bad = PeerId::random();

        let mut lookup = Lookup::new(local, target, 20, vec![good, bad]);
        while let Some(peer) = lookup.next_to_query() {
            if peer == bad {
                lookup.on_failure(&peer);
            } else {
                lookup.on_response(&peer);
            }
        }
        assert_eq!(lookup.closest_queried(20), vec![good]);
    }

    #[test]
    fn test_convergence_gate_after_k_responses() {
        let target = digest();
        let local = PeerId::random();
        let seeds: Vec<PeerId> = (0..4).map(|_| PeerId::random()).collect();

        let mut lookup = Lookup::new(local, target, 2, seeds.clone());

        // Answer with the two closest; the two farther seeds must then be
        // rejected by the convergence gate.
        let mut sorted = seeds;
        sorted.sort_by_cached_key(|p| (target.xor_distance(&p.digest()), *p));
        for peer in &sorted[..2] {
            assert_eq!(lookup.next_to_query(), Some(*peer));
            lookup.on_response(peer);
        }
        assert_eq!(lookup.next_to_query(), None);

        // A candidate closer than every responder reopens the lookup.
        let closer = loop {
            let candidate = PeerId::random();
            let d = target.xor_distance(&candidate.digest());
            if d < target.xor_distance(&sorted[0].digest()) {
                break candidate;
            }
        };
        lookup.add_candidate(closer);
        assert_eq!(lookup.next_to_query(), Some(closer));
    }

    #[test]
    fn test_closest_queried_sorted_and_truncated() {
        let target = digest();
        let local = PeerId::random();
        let seeds: Vec<PeerId> = (0..10).map(|_| PeerId::random()).collect();

        let mut lookup = Lookup::new(local, target, 20, seeds.clone());
        while let Some(peer) = lookup.next_to_query() {
            lookup.on_response(&peer);
        }

        let closest = lookup.closest_queried(3);
        assert_eq!(closest.len(), 3);
        for pair in closest.windows(2) {
            let d0 = target.xor_distance(&pair[0].digest());
            let d1 = target.xor_distance(&pair[1].digest());
            assert!(d0 <= d1);
        }
    }
}
