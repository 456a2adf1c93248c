//! Bootstrap: random-key lookups that populate the routing table.
//!
//! Each cycle runs a handful of lookups toward random keyspace targets;
//! every bucket a lookup passes through picks up the peers it touches.
//! Cycles block until their queries finish - sequential bootstrap was
//! measured to converge faster than parallel because results compound.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use weir_core::PeerId;

use crate::config::BootstrapConfig;
use crate::dht::Dht;
use crate::error::DhtError;

impl Dht {
    /// Runs one bootstrap cycle: `cfg.queries` random-key peer lookups.
    ///
    /// Lookup failures are logged and never abort the cycle; a random
    /// target is not expected to exist, so `NotFound` is the normal
    /// outcome.
    pub async fn bootstrap(
        &self,
        cfg: &BootstrapConfig,
        cancel: &CancellationToken,
    ) -> Result<(), DhtError> {
        for query in 0..cfg.queries.max(1) {
            if cancel.is_cancelled() {
                return Err(DhtError::Cancelled);
            }
            let target = PeerId::random();
            debug!(query, target = %target, "bootstrap lookup");

            let lookup_cancel = cancel.child_token();
            match tokio::time::timeout(cfg.query_timeout, self.find_peer(&target, &lookup_cancel))
                .await
            {
                Ok(Ok(_)) | Ok(Err(DhtError::NotFound)) => {}
                Ok(Err(error)) => warn!(%error, "bootstrap lookup failed"),
                Err(_) => {
                    lookup_cancel.cancel();
                    debug!("bootstrap lookup timed out");
                }
            }
        }
        Ok(())
    }

    /// Spawns a driver that runs a bootstrap cycle every `cfg.period`.
    ///
    /// The first cycle runs immediately. Returns a token that stops the
    /// driver when cancelled.
    pub fn spawn_periodic_bootstrap(self: &Arc<Self>, cfg: BootstrapConfig) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let dht = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cfg.period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = dht.bootstrap(&cfg, &token).await {
                            debug!(%error, "bootstrap cycle interrupted");
                            break;
                        }
                    }
                }
            }
        });
        cancel
    }

    /// Spawns a driver that runs a bootstrap cycle for every message on
    /// `signal`. The driver exits when the signal channel closes or the
    /// returned token is cancelled.
    pub fn bootstrap_on_signal(
        self: &Arc<Self>,
        cfg: BootstrapConfig,
        mut signal: mpsc::Receiver<()>,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let dht = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = signal.recv() => {
                        if message.is_none() {
                            break;
                        }
                        if let Err(error) = dht.bootstrap(&cfg, &token).await {
                            debug!(%error, "bootstrap cycle interrupted");
                            break;
                        }
                    }
                }
            }
        });
        cancel
    }
}
