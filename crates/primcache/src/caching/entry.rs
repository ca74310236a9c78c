use std::time::{Duration, Instant};

use serde::Serialize;

/// Bookkeeping for one cached plan.
///
/// Ordering decisions use the ticks, which come from a per-cache counter
/// bumped on every resolve, so they never tie. The instants only feed metrics.
#[derive(Clone, Debug)]
pub struct EntryMetadata {
    pub(crate) created_at: Instant,
    pub(crate) last_used_at: Instant,
    pub(crate) inserted_tick: u64,
    pub(crate) last_used_tick: u64,
    pub(crate) reuse_count: u64,
}

impl EntryMetadata {
    #[inline]
    pub fn new(now: Instant, tick: u64) -> Self {
        Self {
            created_at: now,
            last_used_at: now,
            inserted_tick: tick,
            last_used_tick: tick,
            reuse_count: 0,
        }
    }

    #[inline]
    pub fn touch(&mut self, now: Instant, tick: u64) {
        self.last_used_at = now;
        self.last_used_tick = tick;
        self.reuse_count = self.reuse_count.saturating_add(1);
    }

    #[inline]
    pub fn inserted_tick(&self) -> u64 {
        self.inserted_tick
    }

    #[inline]
    pub fn last_used_tick(&self) -> u64 {
        self.last_used_tick
    }

    #[inline]
    pub fn reuse_count(&self) -> u64 {
        self.reuse_count
    }
}

pub struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) metadata: EntryMetadata,
}

impl<V> CacheEntry<V> {
    #[inline]
    pub fn new(value: V, now: Instant, tick: u64) -> Self {
        Self {
            value,
            metadata: EntryMetadata::new(now, tick),
        }
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    #[inline]
    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }
}

/// Age, idleness and reuse extremes across a cache's entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheLifetimeSummary {
    pub oldest_entry_age: Option<Duration>,
    pub newest_entry_age: Option<Duration>,
    pub longest_idle: Option<Duration>,
    pub shortest_idle: Option<Duration>,
    pub max_reuse_count: Option<u64>,
}

impl CacheLifetimeSummary {
    pub fn observe(&mut self, metadata: &EntryMetadata, now: Instant) {
        let age = now.saturating_duration_since(metadata.created_at);
        let idle = now.saturating_duration_since(metadata.last_used_at);

        self.oldest_entry_age = self.oldest_entry_age.max(Some(age));
        self.newest_entry_age = Some(self.newest_entry_age.map_or(age, |current| current.min(age)));
        self.longest_idle = self.longest_idle.max(Some(idle));
        self.shortest_idle = Some(self.shortest_idle.map_or(idle, |current| current.min(idle)));
        self.max_reuse_count = self.max_reuse_count.max(Some(metadata.reuse_count));
    }

    pub fn from_entries<'a, V: 'a>(entries: impl Iterator<Item = &'a CacheEntry<V>>) -> Self {
        let now = Instant::now();
        entries.fold(Self::default(), |mut summary, entry| {
            summary.observe(&entry.metadata, now);
            summary
        })
    }
}
