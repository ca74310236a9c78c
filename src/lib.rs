//! Workload runner and CLI plumbing for exercising the plan cache.

pub mod cli;
pub mod workload;
