//! Bounded, shape-keyed plan caching.
//!
//! [`PlanCache`] owns the plans for one backend type. [`PlanCacheRegistry`]
//! holds one cache per backend behind a type-erased [`AnyPlanCache`] so a
//! thread can serve several backends from a single slot.

pub mod cache;
pub mod entry;
pub mod eviction;
pub mod metrics;
pub mod registry;
pub mod settings;

pub use cache::PlanCache;
pub use entry::{CacheEntry, CacheLifetimeSummary, EntryMetadata};
pub use eviction::{DEFAULT_CAPACITY, EvictionPolicy, EvictionStrategy};
pub use metrics::{CacheCounters, CacheEvent, CacheEventKind, CacheMetrics};
pub use registry::{AnyPlanCache, PlanCacheRegistry};
pub use settings::{CacheSettings, SettingsError};
