use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::entry::CacheLifetimeSummary;

/// Most recent interaction with a cache.
///
/// Hits carry no detail so the hot path never formats a key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub cache: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cache, self.kind)?;
        if let Some(detail) = &self.detail {
            write!(f, " -> {detail}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheEventKind {
    Hit,
    MissCreate,
    BuildFailed,
    Evicted,
    Cleared,
}

impl fmt::Display for CacheEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hit => "hit",
            Self::MissCreate => "miss-create",
            Self::BuildFailed => "build-failed",
            Self::Evicted => "evicted",
            Self::Cleared => "cleared",
        })
    }
}

/// Running totals kept by a cache.
#[derive(Clone, Debug, Default)]
pub struct CacheCounters {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) evictions: u64,
    pub(crate) build_failures: u64,
    pub(crate) last_event: Option<CacheEvent>,
}

impl CacheCounters {
    fn record(&mut self, kind: CacheEventKind, cache: &'static str, detail: Option<String>) {
        self.last_event = Some(CacheEvent { kind, cache, detail });
    }

    pub fn record_hit(&mut self, cache: &'static str) {
        self.hits = self.hits.saturating_add(1);
        self.record(CacheEventKind::Hit, cache, None);
    }

    pub fn record_miss(&mut self, cache: &'static str, detail: String) {
        self.misses = self.misses.saturating_add(1);
        self.record(CacheEventKind::MissCreate, cache, Some(detail));
    }

    pub fn record_build_failure(&mut self, cache: &'static str, detail: String) {
        self.build_failures = self.build_failures.saturating_add(1);
        self.record(CacheEventKind::BuildFailed, cache, Some(detail));
    }

    pub fn record_eviction(&mut self, cache: &'static str, detail: String) {
        self.evictions = self.evictions.saturating_add(1);
        self.record(CacheEventKind::Evicted, cache, Some(detail));
    }

    pub fn record_clear(&mut self, cache: &'static str, dropped: usize) {
        self.record(CacheEventKind::Cleared, cache, Some(format!("dropped {dropped} plans")));
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Resolves seen so far, hits plus misses.
    #[inline]
    pub fn lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    /// Fraction of lookups served from the cache, `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// Point-in-time statistics for one cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub build_failures: u64,
    pub hit_rate: f64,
    pub last_event: Option<CacheEvent>,
    pub oldest_entry_age: Option<Duration>,
    pub newest_entry_age: Option<Duration>,
    pub longest_idle: Option<Duration>,
    pub shortest_idle: Option<Duration>,
    pub max_reuse_count: Option<u64>,
}

impl CacheMetrics {
    pub fn from_parts(size: usize, capacity: usize, counters: &CacheCounters, lifetime: CacheLifetimeSummary) -> Self {
        Self {
            size,
            capacity,
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            build_failures: counters.build_failures,
            hit_rate: counters.hit_rate(),
            last_event: counters.last_event.clone(),
            oldest_entry_age: lifetime.oldest_entry_age,
            newest_entry_age: lifetime.newest_entry_age,
            longest_idle: lifetime.longest_idle,
            shortest_idle: lifetime.shortest_idle,
            max_reuse_count: lifetime.max_reuse_count,
        }
    }
}
