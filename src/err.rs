//! The engine's single error taxonomy. Every fallible path returns
//! [`Result<T, Error>`] and propagates with `?`; only the CLI's `main`
//! matches on this enum to choose an exit code and a message for the user.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	// -- PlanParseError --------------------------------------------------
	#[error("failed to parse plan artifact: {0}")]
	PlanParse(String),

	/// A malformed stdin/`--request` request document (§6), distinct from
	/// `PlanParse` so the CLI can give it its own `{error, detail}` envelope
	/// on stdout instead of the generic stderr message.
	#[error("failed to parse request: {0}")]
	RequestParse(String),

	#[error("plan was compiled against a different registry: {which} digest mismatch (plan has {plan_digest}, engine has {engine_digest})")]
	DigestMismatch {
		which: &'static str,
		plan_digest: String,
		engine_digest: String,
	},

	// -- PlanValidationError ----------------------------------------------
	#[error("duplicate node id in plan: {0}")]
	DuplicateNodeId(String),

	#[error("node {node} references unknown input {input}")]
	UnresolvedInput { node: String, input: String },

	#[error("plan graph contains a cycle involving node {0}")]
	CycleDetected(String),

	#[error("plan must have exactly one sink node, found {0}")]
	SinkCountMismatch(usize),

	#[error("node {node} uses unknown operator {op}")]
	UnknownOperator { node: String, op: String },

	#[error("node {node} parameter error: {detail}")]
	InvalidParam { node: String, detail: String },

	#[error("node {node} reads key {key} which is not produced by any ancestor or the seed batch")]
	UnsatisfiedRead { node: String, key: String },

	// -- RegistryError ------------------------------------------------------
	#[error("unknown key id {0}")]
	UnknownKey(u32),

	#[error("unknown key name {0}")]
	UnknownKeyName(String),

	#[error("unknown parameter id {0}")]
	UnknownParam(u32),

	#[error("unknown parameter name {0}")]
	UnknownParamName(String),

	#[error("unknown feature id {0}")]
	UnknownFeature(u32),

	#[error("key {0} is not readable")]
	NotReadable(String),

	#[error("key {0} is not writable")]
	NotWritable(String),

	// -- ExpressionError / PredicateError ------------------------------------
	#[error("column for key {0} is missing from the batch")]
	MissingColumn(String),

	#[error("row index {0} out of bounds")]
	RowIndexOutOfBounds(usize),

	#[error("parameter {0} has no value and no default")]
	UnboundParam(String),

	#[error("expression/predicate nesting exceeds the configured depth limit ({0})")]
	DepthLimitExceeded(u32),

	#[error("invalid regular expression {pattern}: {detail}")]
	InvalidRegex { pattern: String, detail: String },

	#[error("coalesce default literal must not itself be null")]
	NullDefaultLiteral,

	// -- OperatorError --------------------------------------------------
	#[error("operator {op} error: {detail}")]
	Operator { op: String, detail: String },

	// -- DeadlineExceeded / Cancelled -------------------------------------
	#[error("node {node} exceeded its deadline of {budget_ms}ms")]
	DeadlineExceeded { node: String, budget_ms: u64 },

	#[error("node {0} was cancelled")]
	Cancelled(String),

	// -- InternalError --------------------------------------------------
	#[error("internal engine error: {0}")]
	Internal(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid TOML: {0}")]
	Toml(#[from] toml::de::Error),
}
