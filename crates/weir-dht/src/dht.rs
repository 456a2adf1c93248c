//! The DHT engine: public API, RPC handlers and the iterative lookup
//! driver.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use weir_core::{Key, KeyDigest, PeerId, Timestamp};
use weir_net::{Host, HostError, PeerInfo, RequestHandler};
use weir_proto::{DhtMessage, MessageKind, PeerEntry, Record};
use weir_store::Datastore;

use crate::config::DhtConfig;
use crate::error::DhtError;
use crate::lookup::Lookup;
use crate::providers::ProviderStore;
use crate::records::RecordStore;
use crate::routing::{LivenessProbe, RoutingTable};
use crate::validator::ValidatorRegistry;

/// Returns a token that cancels itself once `timeout` elapses.
///
/// Public DHT operations take a cancellation token; this adapts a plain
/// deadline into one.
pub fn deadline(timeout: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        timer.cancel();
    });
    token
}

/// Decision returned by a lookup variant for each reply.
enum Step<T> {
    /// Keep iterating.
    Continue,
    /// Stream entries to the caller's channel, optionally finishing.
    Emit {
        /// Peer entries to deliver.
        entries: Vec<PeerEntry>,
        /// True once the variant's goal is met.
        done: bool,
    },
    /// Short-circuit the lookup with a final value.
    Done(T),
}

struct LookupOutcome<T> {
    /// The k closest peers that answered, for store fan-outs.
    closest: Vec<PeerId>,
    /// Terminal value, if the variant short-circuited.
    value: Option<T>,
}

/// The DHT node.
///
/// One instance per process; it installs itself as the Host's request
/// handler on construction and lives for the lifetime of the peer.
pub struct Dht {
    local: PeerId,
    host: Arc<dyn Host>,
    config: DhtConfig,
    routing: RoutingTable,
    records: RecordStore,
    providers: ProviderStore,
    validators: Arc<ValidatorRegistry>,
    /// Keys this peer has announced; re-announced by maintenance.
    provided: RwLock<HashSet<Key>>,
}

impl Dht {
    /// Creates a DHT over the given host and datastore and installs the
    /// inbound request handler.
    pub fn new(
        host: Arc<dyn Host>,
        datastore: Arc<dyn Datastore>,
        config: DhtConfig,
    ) -> Arc<Self> {
        let local = host.local_id();
        let probe_host = Arc::clone(&host);
        let probe: LivenessProbe = Arc::new(move |peer| probe_host.is_connected(peer));
        let validators = Arc::new(ValidatorRegistry::new());

        let dht = Arc::new(Self {
            local,
            routing: RoutingTable::new(local, config.k, probe),
            records: RecordStore::new(datastore, Arc::clone(&validators)),
            providers: ProviderStore::new(config.provider_ttl),
            validators,
            provided: RwLock::new(HashSet::new()),
            host,
            config,
        });

        let weak = Arc::downgrade(&dht);
        let handler: RequestHandler = Arc::new(move |from, request| {
            let Some(dht) = weak.upgrade() else {
                return Err(HostError::Handler("dht shut down".to_string()));
            };
            dht.handle_request(from, request)
                .map_err(|e| HostError::Handler(e.to_string()))
        });
        dht.host.set_handler(handler);
        dht
    }

    /// Returns the local peer id.
    pub fn local_id(&self) -> PeerId {
        self.local
    }

    /// Returns the routing table.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Returns the validator registry for namespace registration.
    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    /// Returns the provider store.
    pub fn providers(&self) -> &ProviderStore {
        &self.providers
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DhtConfig {
        &self.config
    }

    /// Returns the known contact info for a peer.
    pub fn peer_info(&self, peer: PeerId) -> PeerInfo {
        if peer == self.local {
            return PeerInfo {
                id: peer,
                addrs: self.host.local_addrs(),
            };
        }
        PeerInfo {
            id: peer,
            addrs: self.host.peerstore().addrs(&peer),
        }
    }

    fn peer_entry(&self, peer: PeerId) -> PeerEntry {
        PeerEntry {
            id: peer,
            addrs: self.host.peerstore().addrs(&peer),
        }
    }

    fn self_entry(&self) -> PeerEntry {
        PeerEntry {
            id: self.local,
            addrs: self.host.local_addrs(),
        }
    }

    fn closer_peers(&self, key: &Key, requester: &PeerId) -> Vec<PeerEntry> {
        self.routing
            .nearest(&key.digest(), self.config.k)
            .into_iter()
            .filter(|p| p != requester)
            .map(|p| self.peer_entry(p))
            .collect()
    }

    // === Inbound RPC ===

    /// Handles one decoded request from `from`.
    ///
    /// Any message from a peer refreshes its routing table entry before
    /// dispatch. Every keyed response carries up to k closer peers so the
    /// sender's lookup can converge.
    pub fn handle_request(
        &self,
        from: PeerId,
        request: DhtMessage,
    ) -> Result<DhtMessage, DhtError> {
        self.routing.update(from);

        let key = Key::new(request.key.clone());
        let mut response = DhtMessage::response_to(&request);
        match request.kind {
            MessageKind::Ping => {}

            MessageKind::FindNode => {
                response.closer_peers = self.closer_peers(&key, &from);
            }

            MessageKind::GetValue => {
                response.record = self.records.get(&key)?;
                response.closer_peers = self.closer_peers(&key, &from);
            }

            MessageKind::PutValue => {
                let record = request
                    .record
                    .as_ref()
                    .ok_or_else(|| DhtError::InvalidMessage("put without record".to_string()))?;
                self.records.put(&key, record)?;
                response.record = request.record.clone();
                response.closer_peers = self.closer_peers(&key, &from);
            }

            MessageKind::AddProvider => {
                let now = Timestamp::now();
                for entry in &request.provider_peers {
                    // Only the sender may announce itself; anything else
                    // would let peers forge third-party announcements.
                    if entry.id != from {
                        debug!(peer = %from, claimed = %entry.id, "ignoring foreign provider entry");
                        continue;
                    }
                    self.host.peerstore().add_addrs(&entry.id, &entry.addrs);
                    self.providers.put(&key, entry.id, now);
                }
                response.closer_peers = self.closer_peers(&key, &from);
            }

            MessageKind::GetProviders => {
                let now = Timestamp::now();
                response.provider_peers = self
                    .providers
                    .get(&key, now)
                    .into_iter()
                    .map(|entry| {
                        if entry.provider == self.local {
                            self.self_entry()
                        } else {
                            self.peer_entry(entry.provider)
                        }
                    })
                    .collect();
                response.closer_peers = self.closer_peers(&key, &from);
            }
        }
        Ok(response)
    }

    // === Connection management ===

    /// Connects to a peer and seeds both routing tables.
    ///
    /// The initial ping lets the remote side record this peer too; table
    /// entries otherwise only appear on message receipt.
    pub async fn connect(&self, peer: &PeerId) -> Result<(), DhtError> {
        self.host.connect(peer).await?;
        let request = DhtMessage::request(MessageKind::Ping, Bytes::new());
        self.host
            .send_request(peer, request, self.config.request_timeout)
            .await?;
        self.routing.update(*peer);
        Ok(())
    }

    /// Pings a peer and returns the round-trip time.
    pub async fn ping(&self, peer: &PeerId) -> Result<Duration, DhtError> {
        let start = Instant::now();
        let request = DhtMessage::request(MessageKind::Ping, Bytes::new());
        let response = self
            .host
            .send_request(peer, request, self.config.request_timeout)
            .await?;
        if response.kind != MessageKind::Ping {
            return Err(DhtError::InvalidMessage(format!(
                "expected ping echo, got {:?}",
                response.kind
            )));
        }
        self.routing.update(*peer);
        Ok(start.elapsed())
    }

    // === Iterative lookup driver ===

    /// Drives one iterative lookup toward `target`.
    ///
    /// Dispatches up to alpha concurrent copies of `request` to the
    /// closest fresh candidates, merges `closer_peers` from each reply
    /// into the candidate set, and lets `on_reply` accumulate or
    /// short-circuit. Per-peer failures demote the peer and never fail
    /// the lookup; cancellation aborts in-flight queries and returns the
    /// best-effort outcome.
    async fn run_lookup<T, F>(
        &self,
        target: KeyDigest,
        request: DhtMessage,
        cancel: &CancellationToken,
        sink: Option<&mpsc::Sender<PeerInfo>>,
        mut on_reply: F,
    ) -> LookupOutcome<T>
    where
        F: FnMut(&PeerId, &DhtMessage) -> Step<T>,
    {
        let seeds = self
            .routing
            .nearest(&target, self.config.alpha * self.config.k);
        let mut lookup = Lookup::new(self.local, target, self.config.k, seeds);
        let mut tasks: JoinSet<(PeerId, Result<DhtMessage, HostError>)> = JoinSet::new();
        let mut value = None;

        'drive: loop {
            while tasks.len() < self.config.alpha {
                let Some(peer) = lookup.next_to_query() else {
                    break;
                };
                let host = Arc::clone(&self.host);
                let req = request.clone();
                let timeout = self.config.request_timeout;
                tasks.spawn(async move {
                    let result = host.send_request(&peer, req, timeout).await;
                    (peer, result)
                });
            }

            if tasks.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'drive,
                joined = tasks.join_next() => joined,
            };
            let Some(Ok((peer, result))) = joined else {
                continue;
            };

            match result {
                Ok(response) => {
                    lookup.on_response(&peer);
                    self.routing.update(peer);
                    for entry in &response.closer_peers {
                        if entry.id == self.local {
                            continue;
                        }
                        self.host.peerstore().add_addrs(&entry.id, &entry.addrs);
                        lookup.add_candidate(entry.id);
                    }

                    match on_reply(&peer, &response) {
                        Step::Continue => {}
                        Step::Emit { entries, done } => {
                            if let Some(tx) = sink {
                                for entry in entries {
                                    self.host.peerstore().add_addrs(&entry.id, &entry.addrs);
                                    if tx.send(self.peer_info(entry.id)).await.is_err() {
                                        // Consumer hung up; stop the lookup.
                                        break 'drive;
                                    }
                                }
                            }
                            if done {
                                break 'drive;
                            }
                        }
                        Step::Done(v) => {
                            value = Some(v);
                            break 'drive;
                        }
                    }
                }
                Err(error) => {
                    debug!(peer = %peer, %error, "lookup query failed");
                    lookup.on_failure(&peer);
                    self.routing.remove(&peer);
                }
            }
        }

        tasks.abort_all();
        debug!(
            target = %target,
            queried = lookup.queried_count(),
            terminal = value.is_some(),
            "lookup finished"
        );
        LookupOutcome {
            closest: lookup.closest_queried(self.config.k),
            value,
        }
    }

    // === Public record API ===

    /// Builds a record authored by the local peer, signing it if the
    /// key's namespace requires signatures.
    pub fn make_record(&self, key: &Key, value: Bytes) -> Result<Record, DhtError> {
        let validator = self.validators.lookup(key)?;
        let mut record = Record::new(key.clone(), value, self.local);
        if validator.requires_signature() {
            record.signature = Bytes::from(self.host.keypair().sign(&record.signable_bytes()));
        }
        Ok(record)
    }

    /// Stores a record locally without touching the network.
    pub fn local_put(&self, key: &Key, record: &Record) -> Result<(), DhtError> {
        self.records.put(key, record)
    }

    /// Reads the locally stored record for a key.
    pub fn local_get(&self, key: &Key) -> Result<Option<Record>, DhtError> {
        self.records.get(key)
    }

    /// Stores `value` under `key` on the k peers closest to the key.
    ///
    /// The record is kept locally as well. Per-peer store failures are
    /// logged; the operation only fails if every target rejects it.
    pub async fn put_value(
        &self,
        key: &Key,
        value: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), DhtError> {
        let record = self.make_record(key, value)?;
        self.records.put(key, &record)?;

        let request = DhtMessage::request(MessageKind::FindNode, key.bytes());
        let outcome = self
            .run_lookup::<(), _>(key.digest(), request, cancel, None, |_, _| Step::Continue)
            .await;

        let mut message = DhtMessage::request(MessageKind::PutValue, key.bytes());
        message.record = Some(record);
        self.store_on_peers(message, &outcome.closest).await
    }

    /// Retrieves the value stored under `key`.
    ///
    /// Checks the local store first, then runs a lookup that collects
    /// validator-accepted records; the namespace's best-record policy
    /// picks the winner. Invalid records are discarded and their senders
    /// demoted.
    pub async fn get_value(
        &self,
        key: &Key,
        cancel: &CancellationToken,
    ) -> Result<Bytes, DhtError> {
        if let Some(record) = self.records.get(key)? {
            return Ok(record.value);
        }

        let request = DhtMessage::request(MessageKind::GetValue, key.bytes());
        let mut collected: Vec<Record> = Vec::new();
        self.run_lookup::<(), _>(key.digest(), request, cancel, None, |peer, response| {
            if let Some(record) = &response.record {
                match self.validators.validate(key, record) {
                    Ok(()) => {
                        collected.push(record.clone());
                        return Step::Done(());
                    }
                    Err(error) => {
                        debug!(peer = %peer, %error, "discarding invalid record");
                        self.routing.remove(peer);
                    }
                }
            }
            Step::Continue
        })
        .await;

        if collected.is_empty() {
            return Err(DhtError::NotFound);
        }
        let best = self.validators.select(key, &collected)?;
        Ok(collected.swap_remove(best).value)
    }

    // === Provider API ===

    /// Announces this peer as a provider for `key`.
    ///
    /// Records the announcement locally, remembers the key for periodic
    /// re-announcement, and sends `AddProvider` to the k closest peers.
    pub async fn provide(&self, key: &Key, cancel: &CancellationToken) -> Result<(), DhtError> {
        self.providers.put(key, self.local, Timestamp::now());
        self.provided.write().insert(key.clone());
        self.announce(key, cancel).await
    }

    /// Returns the keys this peer has announced.
    pub fn provided_keys(&self) -> Vec<Key> {
        self.provided.read().iter().cloned().collect()
    }

    pub(crate) async fn announce(
        &self,
        key: &Key,
        cancel: &CancellationToken,
    ) -> Result<(), DhtError> {
        let request = DhtMessage::request(MessageKind::FindNode, key.bytes());
        let outcome = self
            .run_lookup::<(), _>(key.digest(), request, cancel, None, |_, _| Step::Continue)
            .await;

        let mut message = DhtMessage::request(MessageKind::AddProvider, key.bytes());
        message.provider_peers = vec![self.self_entry()];
        self.store_on_peers(message, &outcome.closest).await
    }

    /// Finds providers for `key`, collecting until `count` are found or
    /// the lookup exhausts. A `count` of zero collects everything.
    pub async fn find_providers(
        self: &Arc<Self>,
        key: &Key,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<PeerInfo>, DhtError> {
        let mut rx = self.find_providers_async(key, count, cancel.clone());
        let mut providers = Vec::new();
        while let Some(info) = rx.recv().await {
            providers.push(info);
        }
        Ok(providers)
    }

    /// Streams providers for `key` as they are discovered.
    ///
    /// The channel is unbuffered, so a slow consumer backpressures the
    /// lookup; dropping the receiver cancels it. The stream ends after
    /// `count` entries, on exhaustion, or on cancellation.
    pub fn find_providers_async(
        self: &Arc<Self>,
        key: &Key,
        count: usize,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<PeerInfo> {
        let (tx, rx) = mpsc::channel(1);
        let dht = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            let mut seen: HashSet<PeerId> = HashSet::new();
            let mut remaining = if count == 0 { usize::MAX } else { count };

            // Local providers first; the network is only consulted for
            // the remainder.
            for entry in dht.providers.get(&key, Timestamp::now()) {
                if !seen.insert(entry.provider) {
                    continue;
                }
                if tx.send(dht.peer_info(entry.provider)).await.is_err() {
                    return;
                }
                remaining -= 1;
                if remaining == 0 {
                    return;
                }
            }

            let request = DhtMessage::request(MessageKind::GetProviders, key.bytes());
            dht.run_lookup::<(), _>(
                key.digest(),
                request,
                &cancel,
                Some(&tx),
                |_, response| {
                    let mut fresh: Vec<PeerEntry> = Vec::new();
                    for entry in &response.provider_peers {
                        if seen.insert(entry.id) {
                            fresh.push(entry.clone());
                        }
                    }
                    if fresh.is_empty() {
                        return Step::Continue;
                    }
                    fresh.truncate(remaining);
                    remaining -= fresh.len();
                    Step::Emit {
                        entries: fresh,
                        done: remaining == 0,
                    }
                },
            )
            .await;
        });
        rx
    }

    // === Peer discovery API ===

    /// Locates a peer and returns its contact info.
    pub async fn find_peer(
        &self,
        id: &PeerId,
        cancel: &CancellationToken,
    ) -> Result<PeerInfo, DhtError> {
        if *id == self.local || self.routing.contains(id) {
            return Ok(self.peer_info(*id));
        }

        let target = *id;
        let request =
            DhtMessage::request(MessageKind::FindNode, Bytes::copy_from_slice(id.as_bytes()));
        let outcome = self
            .run_lookup::<PeerInfo, _>(id.digest(), request, cancel, None, |peer, response| {
                if *peer == target || response.closer_peers.iter().any(|e| e.id == target) {
                    return Step::Done(self.peer_info(target));
                }
                Step::Continue
            })
            .await;
        outcome.value.ok_or(DhtError::NotFound)
    }

    /// Streams the peers connected to `target`.
    ///
    /// Runs a lookup toward the target; once the target itself answers,
    /// its closer-peers are exactly its own neighbors. The requester and
    /// the target are excluded from the stream.
    pub fn find_peers_connected_to_peer(
        self: &Arc<Self>,
        target: PeerId,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<PeerInfo> {
        let (tx, rx) = mpsc::channel(1);
        let dht = Arc::clone(self);
        tokio::spawn(async move {
            let mut seen: HashSet<PeerId> = HashSet::new();
            let request = DhtMessage::request(
                MessageKind::FindNode,
                Bytes::copy_from_slice(target.as_bytes()),
            );
            let local = dht.local;
            dht.run_lookup::<(), _>(
                target.digest(),
                request,
                &cancel,
                Some(&tx),
                |peer, response| {
                    if *peer != target {
                        return Step::Continue;
                    }
                    let entries: Vec<PeerEntry> = response
                        .closer_peers
                        .iter()
                        .filter(|e| e.id != target && e.id != local && seen.insert(e.id))
                        .cloned()
                        .collect();
                    if entries.is_empty() {
                        Step::Continue
                    } else {
                        Step::Emit {
                            entries,
                            done: false,
                        }
                    }
                },
            )
            .await;
        });
        rx
    }

    // === Store fan-out ===

    /// Sends a store message to each target peer in parallel.
    ///
    /// Individual failures are logged; only a unanimous failure is an
    /// error.
    async fn store_on_peers(
        &self,
        message: DhtMessage,
        peers: &[PeerId],
    ) -> Result<(), DhtError> {
        if peers.is_empty() {
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for peer in peers {
            let host = Arc::clone(&self.host);
            let request = message.clone();
            let timeout = self.config.request_timeout;
            let peer = *peer;
            tasks.spawn(async move { (peer, host.send_request(&peer, request, timeout).await) });
        }

        let total = peers.len();
        let mut failures = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let Ok((peer, result)) = joined else {
                failures += 1;
                continue;
            };
            if let Err(error) = result {
                warn!(peer = %peer, %error, kind = ?message.kind, "store request failed");
                failures += 1;
            }
        }
        if failures == total {
            return Err(DhtError::AllStoresFailed(total));
        }
        Ok(())
    }

    // === Maintenance ===

    /// Spawns the background maintenance loop: periodic provider GC and
    /// re-announcement of locally provided keys. Returns a token that
    /// stops the loop when cancelled.
    pub fn spawn_maintenance(self: &Arc<Self>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let dht = Arc::clone(self);
        tokio::spawn(async move {
            let mut gc = tokio::time::interval(dht.config.provider_gc_interval);
            let mut reprovide = tokio::time::interval(dht.config.reprovide_interval);
            gc.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            reprovide.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick of each interval.
            gc.tick().await;
            reprovide.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = gc.tick() => {
                        dht.providers.sweep(Timestamp::now());
                    }
                    _ = reprovide.tick() => {
                        for key in dht.provided_keys() {
                            dht.providers.put(&key, dht.local, Timestamp::now());
                            if let Err(error) = dht.announce(&key, &token).await {
                                debug!(key = ?key, %error, "reprovide failed");
                            }
                        }
                    }
                }
            }
        });
        cancel
    }
}

impl std::fmt::Debug for Dht {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dht")
            .field("local", &self.local)
            .field("routing_size", &self.routing.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::Keypair;
    use weir_net::MemNetwork;
    use weir_store::MemDatastore;

    use crate::validator::PermissiveValidator;

    fn test_dht(network: &MemNetwork) -> Arc<Dht> {
        let host = network.add_host(Keypair::generate());
        let dht = Dht::new(host, Arc::new(MemDatastore::new()), DhtConfig::for_tests());
        dht.validators()
            .register("v", Arc::new(PermissiveValidator));
        dht
    }

    #[test]
    fn test_handle_ping_echoes_and_updates_table() {
        let network = MemNetwork::new();
        let dht = test_dht(&network);
        let sender = PeerId::random();

        let request = DhtMessage::request(MessageKind::Ping, Bytes::new());
        let response = dht.handle_request(sender, request).unwrap();

        assert_eq!(response.kind, MessageKind::Ping);
        assert!(dht.routing().contains(&sender));
    }

    #[test]
    fn test_handle_put_then_get_value() {
        let network = MemNetwork::new();
        let dht = test_dht(&network);
        let key = Key::from("/v/hello");
        let sender = PeerId::random();

        let record = Record::new(key.clone(), Bytes::from_static(b"world"), sender);
        let mut put = DhtMessage::request(MessageKind::PutValue, key.bytes());
        put.record = Some(record.clone());
        dht.handle_request(sender, put).unwrap();

        let get = DhtMessage::request(MessageKind::GetValue, key.bytes());
        let response = dht.handle_request(sender, get).unwrap();
        assert_eq!(response.record, Some(record));
    }

    #[test]
    fn test_handle_put_without_record_rejected() {
        let network = MemNetwork::new();
        let dht = test_dht(&network);

        let put = DhtMessage::request(MessageKind::PutValue, Key::from("/v/k").bytes());
        assert!(matches!(
            dht.handle_request(PeerId::random(), put),
            Err(DhtError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_handle_add_provider_accepts_only_sender() {
        let network = MemNetwork::new();
        let dht = test_dht(&network);
        let key = Key::from("announced");
        let sender = PeerId::random();
        let forged = PeerId::random();

        let mut add = DhtMessage::request(MessageKind::AddProvider, key.bytes());
        add.provider_peers = vec![
            PeerEntry {
                id: sender,
                addrs: vec!["/mem/aaaa".to_string()],
            },
            PeerEntry {
                id: forged,
                addrs: vec![],
            },
        ];
        dht.handle_request(sender, add).unwrap();

        let providers = dht.providers().get(&key, Timestamp::now());
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider, sender);
        // The announcement seeded the peerstore.
        assert!(!dht.peer_info(sender).addrs.is_empty());
    }

    #[test]
    fn test_handle_get_providers_carries_closer_peers() {
        let network = MemNetwork::new();
        let dht = test_dht(&network);
        let key = Key::from("announced");
        let requester = PeerId::random();

        // Populate the table so there are closer peers to return.
        for _ in 0..5 {
            dht.routing().update(PeerId::random());
        }

        let get = DhtMessage::request(MessageKind::GetProviders, key.bytes());
        let response = dht.handle_request(requester, get).unwrap();
        assert!(response.provider_peers.is_empty());
        assert!(!response.closer_peers.is_empty());
        assert!(response.closer_peers.iter().all(|e| e.id != requester));
    }
}
