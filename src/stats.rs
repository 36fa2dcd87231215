//! Resolve statistics for the offline worker.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveSource {
    /// Served from the cache store without touching the network.
    Cache,
    /// Fetched from the network and written to the store.
    Network,
    /// Fetched from the network but not cacheable, so not stored.
    NetworkUncached,
    /// Network failed on a navigation; the cached page shell was served.
    ShellFallback,
    /// Network failed and nothing could stand in; a 503 was synthesized.
    Unavailable,
    /// No active worker; the request went straight to the network.
    Uncontrolled,
}

impl ResolveSource {
    /// Short label used in logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
            Self::NetworkUncached => "network-uncached",
            Self::ShellFallback => "shell-fallback",
            Self::Unavailable => "unavailable",
            Self::Uncontrolled => "uncontrolled",
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub network_stored: u64,
    pub network_uncached: u64,
    pub shell_fallbacks: u64,
    pub unavailable: u64,
    pub store_errors: u64,
}

impl StatsSnapshot {
    /// Total number of resolved requests.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.cache_hits
            + self.network_stored
            + self.network_uncached
            + self.shell_fallbacks
            + self.unavailable
    }

    /// Fraction of requests answered from the store, or 0 with no traffic.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Lock-free counters updated by concurrent fetch handlers.
#[derive(Debug, Default)]
pub struct ResolveStats {
    cache_hits: AtomicU64,
    network_stored: AtomicU64,
    network_uncached: AtomicU64,
    shell_fallbacks: AtomicU64,
    unavailable: AtomicU64,
    store_errors: AtomicU64,
}

impl ResolveStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one resolved request.
    pub fn record(&self, source: ResolveSource) {
        let counter = match source {
            ResolveSource::Cache => &self.cache_hits,
            ResolveSource::Network => &self.network_stored,
            ResolveSource::NetworkUncached => &self.network_uncached,
            ResolveSource::ShellFallback => &self.shell_fallbacks,
            ResolveSource::Unavailable => &self.unavailable,
            ResolveSource::Uncontrolled => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a cache write that failed after a successful fetch.
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            network_stored: self.network_stored.load(Ordering::Relaxed),
            network_uncached: self.network_uncached.load(Ordering::Relaxed),
            shell_fallbacks: self.shell_fallbacks.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snap = ResolveStats::new().snapshot();
        assert_eq!(snap, StatsSnapshot::default());
        assert_eq!(snap.total(), 0);
        assert!(snap.hit_ratio().abs() < f64::EPSILON);
    }

    #[test]
    fn record_counts_by_source() {
        let stats = ResolveStats::new();
        stats.record(ResolveSource::Cache);
        stats.record(ResolveSource::Cache);
        stats.record(ResolveSource::Cache);
        stats.record(ResolveSource::Network);
        stats.record(ResolveSource::Unavailable);
        stats.record(ResolveSource::Uncontrolled);
        stats.record_store_error();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 3);
        assert_eq!(snap.network_stored, 1);
        assert_eq!(snap.unavailable, 1);
        assert_eq!(snap.store_errors, 1);
        assert_eq!(snap.total(), 5);
        assert!((snap.hit_ratio() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn labels_match_serialization() {
        for source in [
            ResolveSource::Cache,
            ResolveSource::NetworkUncached,
            ResolveSource::ShellFallback,
        ] {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.label()));
        }
    }
}
