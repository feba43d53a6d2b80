pub mod loader;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::err::{Error, Result};
use crate::expr::Expr;
use crate::pred::RawPredicate;
use crate::registry::Digests;

/// A fully validated, type-checked parameter value attached to a node. One
/// variant per [`crate::registry::operator::ParamType`].
#[derive(Clone, Debug)]
pub enum ParamValue {
	Int(i64),
	Float(f64),
	String(String),
	Bool(bool),
	Pred(Arc<crate::pred::Predicate>),
	Expr(Arc<Expr>),
}

/// The validated parameter bag handed to an operator's `run`/`run_async`.
/// Built once by the loader; operators never see the raw, unchecked JSON.
#[derive(Clone, Debug, Default)]
pub struct ValidatedParams {
	values: HashMap<String, ParamValue>,
}

impl ValidatedParams {
	pub fn new(values: HashMap<String, ParamValue>) -> Self {
		Self {
			values,
		}
	}

	fn get(&self, name: &str) -> Result<&ParamValue> {
		self.values
			.get(name)
			.ok_or_else(|| Error::Internal(format!("parameter {name} was not validated")))
	}

	pub fn int(&self, name: &str) -> Result<i64> {
		match self.get(name)? {
			ParamValue::Int(v) => Ok(*v),
			other => Err(Error::Internal(format!("parameter {name} is not Int: {other:?}"))),
		}
	}

	pub fn float(&self, name: &str) -> Result<f64> {
		match self.get(name)? {
			ParamValue::Float(v) => Ok(*v),
			other => Err(Error::Internal(format!("parameter {name} is not Float: {other:?}"))),
		}
	}

	pub fn string(&self, name: &str) -> Result<&str> {
		match self.get(name)? {
			ParamValue::String(v) => Ok(v.as_str()),
			other => Err(Error::Internal(format!("parameter {name} is not String: {other:?}"))),
		}
	}

	pub fn bool(&self, name: &str) -> Result<bool> {
		match self.get(name)? {
			ParamValue::Bool(v) => Ok(*v),
			other => Err(Error::Internal(format!("parameter {name} is not Bool: {other:?}"))),
		}
	}

	pub fn pred(&self, name: &str) -> Result<Arc<crate::pred::Predicate>> {
		match self.get(name)? {
			ParamValue::Pred(v) => Ok(Arc::clone(v)),
			other => Err(Error::Internal(format!("parameter {name} is not a predicate: {other:?}"))),
		}
	}

	pub fn expr(&self, name: &str) -> Result<Arc<Expr>> {
		match self.get(name)? {
			ParamValue::Expr(v) => Ok(Arc::clone(v)),
			other => Err(Error::Internal(format!("parameter {name} is not an expression: {other:?}"))),
		}
	}

	pub fn optional_float(&self, name: &str) -> Option<f64> {
		match self.values.get(name) {
			Some(ParamValue::Float(v)) => Some(*v),
			_ => None,
		}
	}

	pub fn optional_string(&self, name: &str) -> Option<&str> {
		match self.values.get(name) {
			Some(ParamValue::String(v)) => Some(v.as_str()),
			_ => None,
		}
	}
}

/// Wire shape of a plan node, as embedded in the plan artifact JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNode {
	pub node_id: String,
	pub op: String,
	#[serde(default)]
	pub params: serde_json::Map<String, serde_json::Value>,
	#[serde(default)]
	pub inputs: Vec<String>,
	#[serde(default)]
	pub budget: Option<NodeBudget>,
	#[serde(default)]
	pub trace: Option<bool>,
	#[serde(default)]
	pub project: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeBudget {
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuiltBy {
	pub backend: String,
	pub tool: String,
	pub tool_version: String,
	#[serde(default)]
	pub bundle_digest: Option<String>,
}

/// The raw plan artifact as parsed from JSON, before validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPlan {
	pub plan_name: String,
	pub nodes: Vec<RawNode>,
	pub sink_node_id: String,
	pub digests: Digests,
	pub built_by: BuiltBy,
	#[serde(default)]
	pub predicates: HashMap<String, RawPredicate>,
	#[serde(default)]
	pub expressions: HashMap<String, Expr>,
}

/// A validated plan node, ready for the scheduler: operator spec resolved,
/// params type-checked, inputs still referenced by name (the scheduler looks
/// up sibling `RowSet`s via the node-state table).
#[derive(Clone)]
pub struct PlanNode {
	pub node_id: String,
	pub op: String,
	pub inputs: Vec<String>,
	pub validated_params: ValidatedParams,
	pub budget_ms: u64,
	pub trace: bool,
	pub project: Option<Vec<String>>,
}

/// A validated plan: a topologically ordered node list plus the sink id.
#[derive(Clone)]
pub struct Plan {
	pub plan_name: String,
	pub nodes: Vec<PlanNode>,
	pub sink_node_id: String,
}

impl Plan {
	pub fn node(&self, node_id: &str) -> Option<&PlanNode> {
		self.nodes.iter().find(|n| n.node_id == node_id)
	}

	pub fn sink(&self) -> &PlanNode {
		self.node(&self.sink_node_id).expect("sink node validated to exist")
	}
}
