//! DHT configuration.

use std::time::Duration;

use weir_core::{DEFAULT_ALPHA, DEFAULT_K};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default provider record time-to-live (24 hours).
pub const DEFAULT_PROVIDER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between provider garbage-collection sweeps (1 hour).
pub const DEFAULT_PROVIDER_GC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default interval between re-announcements of provided keys (12 hours).
pub const DEFAULT_REPROVIDE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default period between periodic bootstrap cycles (5 minutes).
pub const DEFAULT_BOOTSTRAP_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Configuration for a bootstrap cycle.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Number of random-key lookups per cycle.
    pub queries: usize,
    /// Period of the periodic bootstrap driver.
    pub period: Duration,
    /// Deadline applied to each bootstrap lookup.
    pub query_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            queries: 1,
            period: DEFAULT_BOOTSTRAP_PERIOD,
            query_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// DHT engine configuration.
#[derive(Debug, Clone)]
pub struct DhtConfig {
    /// Maximum bucket size and store fan-out width (k).
    pub k: usize,
    /// Concurrent lookup fanout (alpha).
    pub alpha: usize,
    /// Per-request deadline for outbound queries.
    pub request_timeout: Duration,
    /// Provider records expire this long after being recorded.
    pub provider_ttl: Duration,
    /// Interval between provider garbage-collection sweeps.
    pub provider_gc_interval: Duration,
    /// Interval between re-announcements of locally provided keys.
    pub reprovide_interval: Duration,
    /// Bootstrap settings.
    pub bootstrap: BootstrapConfig,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            alpha: DEFAULT_ALPHA,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            provider_ttl: DEFAULT_PROVIDER_TTL,
            provider_gc_interval: DEFAULT_PROVIDER_GC_INTERVAL,
            reprovide_interval: DEFAULT_REPROVIDE_INTERVAL,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl DhtConfig {
    /// Configuration with short timeouts for in-process test networks.
    pub fn for_tests() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            bootstrap: BootstrapConfig {
                queries: 1,
                period: Duration::from_millis(200),
                query_timeout: Duration::from_secs(2),
            },
            ..Self::default()
        }
    }
}
