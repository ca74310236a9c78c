//! Victim selection once a cache is full.
//!
//! Eviction only runs when a miss has produced a plan and the cache is at
//! capacity; exactly one entry is removed. There is no time-based expiry.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;

/// Default number of plans one cache holds.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Evict the entry resolved least recently.
    #[default]
    Lru,
    /// Evict the entry inserted earliest, regardless of use.
    Fifo,
}

impl EvictionStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Fifo => "fifo",
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "fifo" => Ok(EvictionStrategy::Fifo),
            other => Err(format!("unknown eviction strategy '{other}' (expected lru or fifo)")),
        }
    }
}

/// Capacity and victim strategy for a [`PlanCache`](super::PlanCache).
///
/// ```
/// use primcache::caching::{EvictionPolicy, EvictionStrategy};
/// use std::num::NonZeroUsize;
///
/// let policy = EvictionPolicy::fifo(NonZeroUsize::new(16).unwrap());
/// assert_eq!(policy.strategy, EvictionStrategy::Fifo);
/// assert_eq!(EvictionPolicy::default().capacity.get(), 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    pub strategy: EvictionStrategy,
    pub capacity: NonZeroUsize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::lru(DEFAULT_CAPACITY)
    }
}

impl EvictionPolicy {
    #[inline]
    pub const fn lru(capacity: NonZeroUsize) -> Self {
        Self {
            strategy: EvictionStrategy::Lru,
            capacity,
        }
    }

    #[inline]
    pub const fn fifo(capacity: NonZeroUsize) -> Self {
        Self {
            strategy: EvictionStrategy::Fifo,
            capacity,
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    #[inline]
    pub fn is_full(&self, len: usize) -> bool {
        len >= self.capacity.get()
    }

    /// Key of the entry to evict, or `None` for an empty cache.
    pub fn select_victim<'a, K: 'a, V: 'a>(&self, entries: impl Iterator<Item = (&'a K, &'a CacheEntry<V>)>) -> Option<&'a K> {
        let order: fn(&CacheEntry<V>) -> u64 = match self.strategy {
            EvictionStrategy::Lru => |entry: &CacheEntry<V>| entry.metadata.last_used_tick,
            EvictionStrategy::Fifo => |entry: &CacheEntry<V>| entry.metadata.inserted_tick,
        };
        entries.min_by_key(|(_, entry)| order(entry)).map(|(key, _)| key)
    }
}
