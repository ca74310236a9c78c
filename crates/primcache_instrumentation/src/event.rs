//! Canonical metric event definitions.

use serde::{Deserialize, Serialize};

/// Structured metric events emitted by the plan cache and its plan handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MetricEvent {
    /// One `resolve` call against a plan cache.
    PlanCacheAccess { cache: String, key: String, hit: bool },
    /// A plan was constructed on a cache miss.
    PlanBuilt { cache: String, key: String, build_us: u64 },
    /// Plan construction (or the configuration closure) failed; nothing was inserted.
    PlanBuildFailed { cache: String, key: String },
    /// An entry was dropped to make room for a new one.
    PlanCacheEviction {
        cache: String,
        strategy: String,
        key: String,
        size_after: u64,
    },
    /// Periodic hit-rate summary.
    PlanCacheSummary {
        cache: String,
        hits: u64,
        misses: u64,
        hit_rate: f64,
        size: u64,
    },
    /// A plan handle created the memory object for an argument role.
    ArgumentMemoryCreated { plan: String, role: String, bytes: u64 },
}

impl MetricEvent {
    /// Short name used by the console exporter.
    pub fn kind(&self) -> &'static str {
        match self {
            MetricEvent::PlanCacheAccess { .. } => "plan_cache_access",
            MetricEvent::PlanBuilt { .. } => "plan_built",
            MetricEvent::PlanBuildFailed { .. } => "plan_build_failed",
            MetricEvent::PlanCacheEviction { .. } => "plan_cache_eviction",
            MetricEvent::PlanCacheSummary { .. } => "plan_cache_summary",
            MetricEvent::ArgumentMemoryCreated { .. } => "argument_memory_created",
        }
    }
}
