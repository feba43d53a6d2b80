//! Environment-tunable engine constants, parsed once at first access.

use once_cell::sync::Lazy;

use crate::mac::lazy_env_parse;

/// Number of concurrent CPU-offload tasks the scheduler's worker pool allows.
pub static WORKER_POOL_SIZE: Lazy<usize> =
	lazy_env_parse!("RANKCORE_WORKER_POOL_SIZE", usize, num_cpus::get());

/// Recursion guard for expression/predicate tree evaluation.
pub static MAX_COMPUTATION_DEPTH: Lazy<u32> =
	lazy_env_parse!("RANKCORE_MAX_COMPUTATION_DEPTH", u32, 120);

/// Fallback per-node effective budget when neither the node nor its operator
/// spec supplies a `timeout_ms`.
pub static DEFAULT_NODE_TIMEOUT_MS: Lazy<u64> =
	lazy_env_parse!("RANKCORE_DEFAULT_NODE_TIMEOUT_MS", u64, 5000);
