use std::time::Instant;

use primcache_instrumentation::{MetricEvent, record_metric};
use rustc_hash::FxHashMap;

use super::entry::{CacheEntry, CacheLifetimeSummary};
use super::eviction::EvictionPolicy;
use super::metrics::{CacheCounters, CacheMetrics};
use super::settings::CacheSettings;
use crate::backend::KernelBackend;
use crate::bindings::BindingMode;
use crate::config::PlanConfig;
use crate::error::PlanError;
use crate::key::OpKey;
use crate::plan::PlanHandle;

/// Lookups between two `PlanCacheSummary` metrics.
const SUMMARY_INTERVAL: u64 = 100;

/// Bounded map from [`OpKey`] to a constructed [`PlanHandle`].
///
/// Plans are built lazily on the first resolve of a key and reused on every
/// later one. When full, a miss evicts exactly one entry chosen by the
/// [`EvictionPolicy`]; a failed build evicts nothing and inserts nothing.
///
/// Entries live in a dense slot vector addressed through `index`, so a hit
/// costs one hash lookup and never allocates.
pub struct PlanCache<B: KernelBackend> {
    index: FxHashMap<OpKey, usize>,
    slots: Vec<CacheEntry<PlanHandle<B>>>,
    counters: CacheCounters,
    policy: EvictionPolicy,
    binding_mode: BindingMode,
    tick: u64,
}

impl<B: KernelBackend> Default for PlanCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: KernelBackend> PlanCache<B> {
    /// LRU cache holding up to 1024 plans.
    pub fn new() -> Self {
        Self::from_settings(&CacheSettings::default())
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self::from_settings(&CacheSettings {
            policy,
            ..CacheSettings::default()
        })
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            index: FxHashMap::default(),
            slots: Vec::new(),
            counters: CacheCounters::default(),
            policy: settings.policy,
            binding_mode: settings.binding_mode,
            tick: 0,
        }
    }

    /// Return the plan for `key`, building it on a miss.
    ///
    /// On a miss `configure` runs once against a fresh [`PlanConfig`] before
    /// `backend.build_plan`. On a hit neither runs. Errors from either are
    /// returned unchanged and leave the cache as it was.
    pub fn resolve<F>(&mut self, backend: &B, key: OpKey, configure: F) -> Result<&mut PlanHandle<B>, PlanError>
    where
        F: FnOnce(&mut PlanConfig) -> Result<(), PlanError>,
    {
        let span = tracing::debug_span!("plan_cache_resolve", cache = B::NAME);
        let _enter = span.enter();

        let now = Instant::now();
        self.tick += 1;
        let tick = self.tick;

        if let Some(&slot) = self.index.get(&key) {
            record_metric!(MetricEvent::PlanCacheAccess {
                cache: B::NAME.to_string(),
                key: key.to_string(),
                hit: true,
            });
            self.counters.record_hit(B::NAME);
            self.maybe_emit_summary(self.slots.len());

            let entry = &mut self.slots[slot];
            entry.metadata.touch(now, tick);
            return Ok(entry.value_mut());
        }

        let detail = key.to_string();
        record_metric!(MetricEvent::PlanCacheAccess {
            cache: B::NAME.to_string(),
            key: detail.clone(),
            hit: false,
        });
        self.counters.record_miss(B::NAME, detail.clone());

        let started = Instant::now();
        let plan = match Self::build(backend, &key, configure) {
            Ok(plan) => plan,
            Err(error) => {
                tracing::debug!(cache = B::NAME, key = %detail, %error, "plan construction failed");
                record_metric!(MetricEvent::PlanBuildFailed {
                    cache: B::NAME.to_string(),
                    key: detail.clone(),
                });
                self.counters.record_build_failure(B::NAME, detail);
                self.maybe_emit_summary(self.slots.len());
                return Err(error);
            }
        };
        record_metric!(MetricEvent::PlanBuilt {
            cache: B::NAME.to_string(),
            key: detail.clone(),
            build_us: started.elapsed().as_micros() as u64,
        });

        if self.policy.is_full(self.slots.len()) {
            self.evict_one();
        }
        self.maybe_emit_summary(self.slots.len() + 1);

        let handle = PlanHandle::new(key.clone(), plan, self.binding_mode);
        let slot = self.slots.len();
        self.slots.push(CacheEntry::new(handle, now, tick));
        self.index.insert(key, slot);
        Ok(self.slots[slot].value_mut())
    }

    /// [`resolve`](Self::resolve) using the key's own variant as the configuration closure.
    pub fn resolve_variant(&mut self, backend: &B, key: OpKey) -> Result<&mut PlanHandle<B>, PlanError> {
        let variant = key.variant;
        self.resolve(backend, key, variant.closure())
    }

    fn build<F>(backend: &B, key: &OpKey, configure: F) -> Result<B::Plan, PlanError>
    where
        F: FnOnce(&mut PlanConfig) -> Result<(), PlanError>,
    {
        let mut config = PlanConfig::default();
        configure(&mut config)?;
        backend.build_plan(key, &config)
    }

    fn evict_one(&mut self) {
        let slots = &self.slots;
        let candidates = self.index.iter().map(|(key, &slot)| (key, &slots[slot]));
        let Some(victim) = self.policy.select_victim(candidates).cloned() else {
            return;
        };
        let Some(slot) = self.index.remove(&victim) else {
            return;
        };
        self.slots.swap_remove(slot);
        // The former last entry now lives in `slot`.
        if let Some(moved) = self.slots.get(slot)
            && let Some(position) = self.index.get_mut(moved.value().key())
        {
            *position = slot;
        }

        let strategy = self.policy.strategy.as_str();
        let detail = victim.to_string();
        tracing::debug!(cache = B::NAME, strategy, key = %detail, size_after = self.slots.len(), "evicted plan");
        record_metric!(MetricEvent::PlanCacheEviction {
            cache: B::NAME.to_string(),
            strategy: strategy.to_string(),
            key: detail.clone(),
            size_after: self.slots.len() as u64,
        });
        self.counters.record_eviction(B::NAME, format!("{strategy}:{detail}"));
    }

    fn maybe_emit_summary(&self, size: usize) {
        let lookups = self.counters.lookups();
        if lookups == 0 || !lookups.is_multiple_of(SUMMARY_INTERVAL) {
            return;
        }
        record_metric!(MetricEvent::PlanCacheSummary {
            cache: B::NAME.to_string(),
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            hit_rate: self.counters.hit_rate(),
            size: size as u64,
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.policy.capacity.get()
    }

    #[inline]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    #[inline]
    pub fn binding_mode(&self) -> BindingMode {
        self.binding_mode
    }

    #[inline]
    pub fn contains(&self, key: &OpKey) -> bool {
        self.index.contains_key(key)
    }

    /// Look at a cached plan without counting a lookup or refreshing recency.
    pub fn peek(&self, key: &OpKey) -> Option<&PlanHandle<B>> {
        self.index.get(key).map(|&slot| self.slots[slot].value())
    }

    pub fn metrics(&self) -> CacheMetrics {
        let lifetime = CacheLifetimeSummary::from_entries(self.slots.iter());
        CacheMetrics::from_parts(self.slots.len(), self.capacity(), &self.counters, lifetime)
    }

    /// Drop every plan. Returns how many were dropped; counters are kept.
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        self.slots.clear();
        self.index.clear();
        self.counters.record_clear(B::NAME, dropped);
        tracing::debug!(cache = B::NAME, dropped, "cleared plan cache");
        dropped
    }
}

#[cfg(test)]
#[path = "eviction_tests.rs"]
mod eviction_tests;
