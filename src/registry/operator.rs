//! The operator registry: the central dispatch table operators register
//! themselves into, exactly once, at process start. After the registry is
//! built it is handed to the scheduler as an immutable, shared table.

use std::collections::HashSet;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::ctx::{ExecCtx, ExecCtxAsync};
use crate::err::Result;
use crate::plan::ValidatedParams;
use crate::rowset::RowSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
	Int,
	Float,
	String,
	Bool,
	PredId,
	ExprId,
}

#[derive(Clone, Debug)]
pub struct ParamSchemaEntry {
	pub name: &'static str,
	pub ty: ParamType,
	pub required: bool,
	pub nullable: bool,
	pub default_value: Option<crate::value::Value>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputPattern {
	UnaryPreserveView,
	StableFilter,
	PermutationOfInput,
	Source,
	NAryMerge,
}

/// A synchronous operator entrypoint.
pub type SyncRun = fn(&[RowSet], &ValidatedParams, &ExecCtx) -> Result<RowSet>;

/// An asynchronous operator entrypoint. Boxed because operators differ in
/// their concrete future type; this mirrors how the wider example pack
/// stores heterogeneous async callbacks behind a single dispatch table.
pub type AsyncRun =
	for<'a> fn(&'a [RowSet], &'a ValidatedParams, &'a ExecCtxAsync) -> BoxFuture<'a, Result<RowSet>>;

/// Computes the set of key ids a node reads, given its validated params. A
/// plain function rather than a static set because operators like `filter`
/// and `vm` reference keys chosen by the plan author, not by the operator.
pub type ReadsFn = fn(&ValidatedParams) -> HashSet<u32>;

/// Computes the set of key ids a node writes, given its validated params.
pub type WritesFn = fn(&ValidatedParams) -> HashSet<u32>;

#[derive(Clone)]
pub struct OperatorSpec {
	pub op: &'static str,
	pub params_schema: Vec<ParamSchemaEntry>,
	pub reads_fn: ReadsFn,
	pub writes_fn: WritesFn,
	pub default_budget_ms: u64,
	pub output_pattern: OutputPattern,
	pub writes_effect: Option<&'static str>,
	pub is_io: bool,
	pub run: SyncRun,
	pub run_async: Option<AsyncRun>,
	pub min_inputs: usize,
	pub max_inputs: Option<usize>,
}

impl std::fmt::Debug for OperatorSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OperatorSpec")
			.field("op", &self.op)
			.field("output_pattern", &self.output_pattern)
			.field("is_io", &self.is_io)
			.finish()
	}
}

/// The frozen-after-init table of all registered operator specs.
#[derive(Clone, Debug, Default)]
pub struct OperatorRegistry {
	by_name: std::collections::HashMap<&'static str, OperatorSpec>,
}

impl OperatorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an operator spec. Panics on duplicate registration, since
	/// this only ever runs once at process start against a table that is not
	/// yet shared — a duplicate here is a programming error, not a runtime
	/// condition callers need to recover from.
	pub fn register(&mut self, spec: OperatorSpec) {
		let existing = self.by_name.insert(spec.op, spec);
		assert!(existing.is_none(), "operator registered twice");
	}

	pub fn find(&self, op: &str) -> Option<&OperatorSpec> {
		self.by_name.get(op)
	}

	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}

	pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.by_name.keys().copied()
	}
}
