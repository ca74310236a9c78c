use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

use super::cache::PlanCache;
use super::metrics::CacheMetrics;
use crate::backend::KernelBackend;

/// Object-safe view of a [`PlanCache`] for any backend.
pub trait AnyPlanCache: Any {
    fn cache_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn clear(&mut self) -> usize;
    fn metrics(&self) -> CacheMetrics;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<B: KernelBackend> AnyPlanCache for PlanCache<B> {
    fn cache_name(&self) -> &'static str {
        B::NAME
    }

    fn len(&self) -> usize {
        PlanCache::len(self)
    }

    fn clear(&mut self) -> usize {
        PlanCache::clear(self)
    }

    fn metrics(&self) -> CacheMetrics {
        PlanCache::metrics(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One plan cache per backend type.
#[derive(Default)]
pub struct PlanCacheRegistry {
    caches: FxHashMap<TypeId, Box<dyn AnyPlanCache>>,
}

impl PlanCacheRegistry {
    /// The cache for `B`, created with `init` on first use.
    pub fn cache_mut<B: KernelBackend>(&mut self, init: impl FnOnce() -> PlanCache<B>) -> &mut PlanCache<B> {
        let slot = self
            .caches
            .entry(TypeId::of::<B>())
            .or_insert_with(|| Box::new(init()) as Box<dyn AnyPlanCache>);
        slot.as_any_mut()
            .downcast_mut::<PlanCache<B>>()
            .expect("plan cache registered under a foreign TypeId")
    }

    pub fn get<B: KernelBackend>(&self) -> Option<&PlanCache<B>> {
        self.caches
            .get(&TypeId::of::<B>())
            .and_then(|cache| cache.as_any().downcast_ref::<PlanCache<B>>())
    }

    /// Install `cache` for `B`, returning the number of plans the old one held.
    pub fn replace<B: KernelBackend>(&mut self, cache: PlanCache<B>) -> usize {
        self.caches
            .insert(TypeId::of::<B>(), Box::new(cache))
            .map_or(0, |previous| previous.len())
    }

    pub fn metrics<B: KernelBackend>(&self) -> Option<CacheMetrics> {
        self.get::<B>().map(PlanCache::metrics)
    }

    pub fn metrics_by_name(&self) -> Vec<(&'static str, CacheMetrics)> {
        let mut all: Vec<_> = self.caches.values().map(|cache| (cache.cache_name(), cache.metrics())).collect();
        all.sort_by_key(|(name, _)| *name);
        all
    }

    /// Empty every cache; returns the total number of plans dropped.
    pub fn clear(&mut self) -> usize {
        self.caches.values_mut().map(|cache| cache.clear()).sum()
    }
}
