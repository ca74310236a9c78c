//! Per-thread plan caches.
//!
//! Each thread owns one [`PlanCacheRegistry`], so a cache is never shared and
//! resolving takes no lock. The cache for a backend is created on first use
//! from [`CacheSettings::from_env`] and dropped when the thread exits.

use std::cell::RefCell;

use crate::backend::KernelBackend;
use crate::caching::{CacheMetrics, CacheSettings, EvictionPolicy, PlanCache, PlanCacheRegistry};

thread_local! {
    static PLAN_CACHES: RefCell<PlanCacheRegistry> = RefCell::new(PlanCacheRegistry::default());
}

fn cache_from_env<B: KernelBackend>() -> PlanCache<B> {
    match CacheSettings::from_env() {
        Ok(settings) => PlanCache::from_settings(&settings),
        Err(error) => {
            tracing::warn!(cache = B::NAME, %error, "invalid plan cache environment, using defaults");
            PlanCache::new()
        }
    }
}

/// Run `f` with this thread's cache for `B`.
///
/// # Panics
/// If called again from inside `f`.
pub fn with_plan_cache<B: KernelBackend, R>(f: impl FnOnce(&mut PlanCache<B>) -> R) -> R {
    PLAN_CACHES.with(|registry| {
        let mut registry = registry.borrow_mut();
        f(registry.cache_mut::<B>(cache_from_env::<B>))
    })
}

/// Replace this thread's cache for `B` with an empty one built from `settings`.
/// Returns the number of plans dropped.
pub fn set_thread_cache_settings<B: KernelBackend>(settings: &CacheSettings) -> usize {
    PLAN_CACHES.with(|registry| registry.borrow_mut().replace::<B>(PlanCache::from_settings(settings)))
}

/// Replace this thread's cache for `B` with an empty one using `policy`,
/// keeping the current binding mode. Returns the number of plans dropped.
pub fn set_thread_cache_policy<B: KernelBackend>(policy: EvictionPolicy) -> usize {
    let binding_mode = with_plan_cache::<B, _>(|cache| cache.binding_mode());
    set_thread_cache_settings::<B>(&CacheSettings { policy, binding_mode })
}

/// Metrics for this thread's cache for `B`, if it has been created.
pub fn thread_cache_metrics<B: KernelBackend>() -> Option<CacheMetrics> {
    PLAN_CACHES.with(|registry| registry.borrow().metrics::<B>())
}

/// Metrics for every backend cache on this thread, sorted by cache name.
pub fn thread_cache_metrics_by_name() -> Vec<(&'static str, CacheMetrics)> {
    PLAN_CACHES.with(|registry| registry.borrow().metrics_by_name())
}

/// Empty every cache on this thread; returns the number of plans dropped.
pub fn clear_thread_caches() -> usize {
    PLAN_CACHES.with(|registry| registry.borrow_mut().clear())
}
