//! Execution context threaded through expression/predicate evaluation and
//! operator entrypoints: resolved registry parameter values, a recursion
//! depth guard, and — for the async path — a cancellation token and deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use trice::Instant;

use crate::value::Value;

/// A read-only handle a cancelled-or-not flag, cloned into every task that
/// needs to observe cancellation at its suspension points.
#[derive(Clone, Debug)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}

/// The write side of a [`Cancellation`], held by the scheduler only.
#[derive(Clone, Debug)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
	pub fn new() -> (Canceller, Cancellation) {
		let flag = Arc::new(AtomicBool::new(false));
		(Canceller(Arc::clone(&flag)), Cancellation(flag))
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}
}

/// Context available to a synchronous operator's `run` and to the
/// expression/predicate evaluators.
#[derive(Clone, Debug)]
pub struct ExecCtx {
	param_values: Arc<HashMap<u32, Value>>,
	depth_limit: u32,
}

impl ExecCtx {
	pub fn new(param_values: HashMap<u32, Value>, depth_limit: u32) -> Self {
		Self {
			param_values: Arc::new(param_values),
			depth_limit,
		}
	}

	pub fn param(&self, param_id: u32) -> Option<&Value> {
		self.param_values.get(&param_id)
	}

	pub fn depth_limit(&self) -> u32 {
		self.depth_limit
	}
}

/// Context available to an asynchronous operator's `run_async`: everything
/// `ExecCtx` has, plus a cancellation token and an optional deadline this
/// node must respect cooperatively at its own suspension points.
#[derive(Clone, Debug)]
pub struct ExecCtxAsync {
	base: ExecCtx,
	cancellation: Cancellation,
	deadline: Option<Instant>,
}

impl ExecCtxAsync {
	pub fn new(base: ExecCtx, cancellation: Cancellation, deadline: Option<Instant>) -> Self {
		Self {
			base,
			cancellation,
			deadline,
		}
	}

	pub fn param(&self, param_id: u32) -> Option<&Value> {
		self.base.param(param_id)
	}

	pub fn depth_limit(&self) -> u32 {
		self.base.depth_limit()
	}

	pub fn sync(&self) -> &ExecCtx {
		&self.base
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}

	pub fn is_timedout(&self) -> bool {
		match self.deadline {
			Some(d) => Instant::now() >= d,
			None => false,
		}
	}

	pub fn cancellation(&self) -> Cancellation {
		self.cancellation.clone()
	}
}
