//! Synthetic int4 matmul stream used by the CLI and the benches.

use std::fmt;
use std::time::Instant;

use primcache::caching::{CacheMetrics, CacheSettings};
use primcache::context::{set_thread_cache_settings, thread_cache_metrics};
use primcache::host::{HostBackend, ProbeSnapshot, pack_u4};
use primcache::ops::{Int4MatmulArgs, Quantization, TensorArg, TensorArgMut, matmul_int4, matmul_int4_resadd, matmul_int4_silu};
use primcache::{Activation, DataType, Granularity, OpVariant, PlanError, TensorDesc};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkloadError {
    #[error("working set must hold at least one shape")]
    EmptyWorkingSet,
    #[error("variant {0} has no int4 matmul entry point")]
    UnsupportedVariant(OpVariant),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub settings: CacheSettings,
    /// Calls cycle through `M = 1..=working_set`.
    pub working_set: usize,
    pub iterations: usize,
    /// K and N of every call.
    pub hidden: usize,
    pub variant: OpVariant,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub variant: String,
    pub iterations: usize,
    pub working_set: usize,
    pub elapsed_us: u64,
    pub cache: CacheMetrics,
    pub backend: ProbeSnapshot,
}

/// Host buffers for one `M` of the working set.
pub struct ShapeBuffers {
    src_desc: TensorDesc,
    weights_desc: TensorDesc,
    dst_desc: TensorDesc,
    src: Vec<f32>,
    weights: Vec<u8>,
    scales: Vec<f32>,
    residual: Vec<f32>,
    dst: Vec<f32>,
}

impl ShapeBuffers {
    pub fn new(m: usize, hidden: usize) -> Self {
        let nibbles: Vec<u8> = (0..hidden * hidden).map(|i| (i % 16) as u8).collect();
        Self {
            src_desc: TensorDesc::new([m, hidden], DataType::F32),
            weights_desc: TensorDesc::new([hidden, hidden], DataType::U4),
            dst_desc: TensorDesc::new([m, hidden], DataType::F32),
            src: (0..m * hidden).map(|i| (i % 7) as f32 * 0.25).collect(),
            weights: pack_u4(&nibbles),
            scales: vec![0.01; hidden],
            residual: vec![1.0; m * hidden],
            dst: vec![0.0; m * hidden],
        }
    }

    /// Run one call of `variant` on the calling thread's cache.
    pub fn run(&mut self, backend: &HostBackend, variant: OpVariant) -> Result<(), WorkloadError> {
        let entry = match variant {
            OpVariant::Plain => matmul_int4::<HostBackend>,
            OpVariant::Activation(Activation::Silu) => matmul_int4_silu::<HostBackend>,
            OpVariant::ResidualAdd => matmul_int4_resadd::<HostBackend>,
            other => return Err(WorkloadError::UnsupportedVariant(other)),
        };
        let (engine, stream) = (backend.engine(), backend.stream());
        let args = Int4MatmulArgs {
            src: TensorArg::new(&self.src, &self.src_desc),
            weights: TensorArg::from_bytes(&self.weights, &self.weights_desc),
            scales: Some(Quantization::new(&self.scales, Granularity::PerChannel, DataType::F32)),
            zero_points: None,
            dst: TensorArgMut::new(&mut self.dst, &self.dst_desc),
            residual: variant
                .residual_role()
                .map(|_| TensorArg::new(&self.residual, &self.dst_desc)),
        };
        entry(backend, &engine, &stream, args)?;
        Ok(())
    }
}

/// Install a fresh thread cache from `config.settings` and run the stream.
pub fn run_workload(config: &WorkloadConfig) -> Result<WorkloadReport, WorkloadError> {
    if config.working_set == 0 {
        return Err(WorkloadError::EmptyWorkingSet);
    }
    let _span = tracing::info_span!("workload", variant = %config.variant, working_set = config.working_set).entered();
    set_thread_cache_settings::<HostBackend>(&config.settings);

    let backend = HostBackend::new();
    let mut shapes: Vec<ShapeBuffers> = (1..=config.working_set).map(|m| ShapeBuffers::new(m, config.hidden)).collect();

    let start = Instant::now();
    for i in 0..config.iterations {
        shapes[i % config.working_set].run(&backend, config.variant)?;
    }
    let elapsed = start.elapsed();

    let cache = thread_cache_metrics::<HostBackend>().unwrap_or_default();
    tracing::info!(hits = cache.hits, misses = cache.misses, evictions = cache.evictions, "workload finished");

    Ok(WorkloadReport {
        variant: config.variant.to_string(),
        iterations: config.iterations,
        working_set: config.working_set,
        elapsed_us: elapsed.as_micros() as u64,
        cache,
        backend: backend.probe().snapshot(),
    })
}

impl fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "variant {} | {} calls over {} shapes in {:.2} ms",
            self.variant,
            self.iterations,
            self.working_set,
            self.elapsed_us as f64 / 1000.0
        )?;
        writeln!(
            f,
            "cache   size {}/{} | hits {} | misses {} | evictions {} | hit rate {:.1}%",
            self.cache.size,
            self.cache.capacity,
            self.cache.hits,
            self.cache.misses,
            self.cache.evictions,
            self.cache.hit_rate * 100.0
        )?;
        writeln!(
            f,
            "backend plans built {} | layouts derived {} | memory objects {} | executions {}",
            self.backend.plans_built, self.backend.arg_md_derivations, self.backend.memory_created, self.backend.executions
        )
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use primcache::caching::EvictionPolicy;

    use super::*;

    fn config(capacity: usize, working_set: usize, variant: OpVariant) -> WorkloadConfig {
        WorkloadConfig {
            settings: CacheSettings {
                policy: EvictionPolicy::lru(NonZeroUsize::new(capacity).unwrap()),
                ..CacheSettings::default()
            },
            working_set,
            iterations: 40,
            hidden: 8,
            variant,
        }
    }

    #[test]
    fn working_set_within_capacity_only_misses_once_per_shape() {
        let report = run_workload(&config(8, 4, OpVariant::ResidualAdd)).unwrap();
        assert_eq!((report.cache.hits, report.cache.misses), (36, 4));
        assert_eq!(report.backend.plans_built, 4);
        assert_eq!(report.backend.executions, 40);
        assert_eq!(report.cache.evictions, 0);
    }

    #[test]
    fn cycling_past_capacity_thrashes_lru() {
        let report = run_workload(&config(2, 3, OpVariant::Plain)).unwrap();
        assert_eq!(report.cache.hits, 0);
        assert_eq!(report.cache.misses, 40);
        assert_eq!(report.cache.evictions, 38);
        assert_eq!(report.cache.size, 2);
        assert!(report.to_string().contains("hits 0"));
    }

    #[test]
    fn empty_working_set_is_rejected() {
        assert_eq!(run_workload(&config(2, 0, OpVariant::Plain)).err(), Some(WorkloadError::EmptyWorkingSet));
    }

    #[test]
    fn variants_without_an_entry_point_are_rejected() {
        for variant in [
            OpVariant::Activation(Activation::Relu),
            OpVariant::ActivationResidual(Activation::Silu),
            OpVariant::Custom("fused"),
        ] {
            let result = run_workload(&config(2, 1, variant));
            assert_eq!(result.err(), Some(WorkloadError::UnsupportedVariant(variant)));
        }
    }

    #[test]
    fn silu_workload_applies_the_activation() {
        let backend = HostBackend::new();
        let settings = CacheSettings::default();
        set_thread_cache_settings::<HostBackend>(&settings);
        let mut plain = ShapeBuffers::new(1, 8);
        let mut silu = ShapeBuffers::new(1, 8);

        plain.run(&backend, OpVariant::Plain).unwrap();
        silu.run(&backend, OpVariant::Activation(Activation::Silu)).unwrap();

        for (x, y) in plain.dst.iter().zip(&silu.dst) {
            assert!((x / (1.0 + (-x).exp()) - y).abs() < 1e-5);
        }
        assert_eq!(backend.probe().snapshot().plans_built, 2);
    }
}
