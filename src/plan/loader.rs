//! Parses a plan artifact, validates it against the current registries and
//! operator table, and produces a topologically ordered [`Plan`] the
//! scheduler can execute without re-checking anything.

use std::collections::{HashMap, HashSet};

use crate::err::{Error, Result};
use crate::expr::Expr;
use crate::pred::RawPredicate;
use crate::registry::operator::{OperatorRegistry, ParamType};
use crate::registry::Registries;
use crate::value::Value;

use super::{ParamValue, Plan, PlanNode, RawNode, RawPlan, ValidatedParams};

/// Parses `text` as a plan artifact. Does not validate against registries —
/// call [`load_and_validate`] for that.
pub fn parse(text: &str) -> Result<RawPlan> {
	serde_json::from_str(text).map_err(|e| Error::PlanParse(e.to_string()))
}

/// Parses and fully validates a plan artifact against `registries` and
/// `operators`, returning an execution-ready [`Plan`].
pub fn load_and_validate(
	text: &str,
	registries: &Registries,
	operators: &OperatorRegistry,
) -> Result<Plan> {
	let raw = parse(text)?;
	validate(raw, registries, operators)
}

fn validate(raw: RawPlan, registries: &Registries, operators: &OperatorRegistry) -> Result<Plan> {
	check_digests(&raw, registries)?;

	let mut seen_ids = HashSet::new();
	for n in &raw.nodes {
		if !seen_ids.insert(n.node_id.clone()) {
			return Err(Error::DuplicateNodeId(n.node_id.clone()));
		}
	}
	for n in &raw.nodes {
		for input in &n.inputs {
			if !seen_ids.contains(input) {
				return Err(Error::UnresolvedInput {
					node: n.node_id.clone(),
					input: input.clone(),
				});
			}
		}
	}
	if !seen_ids.contains(&raw.sink_node_id) {
		return Err(Error::UnresolvedInput {
			node: "<sink>".to_string(),
			input: raw.sink_node_id.clone(),
		});
	}

	let mut consumed = HashSet::new();
	for n in &raw.nodes {
		for input in &n.inputs {
			consumed.insert(input.clone());
		}
	}
	let sinks: Vec<&str> =
		raw.nodes.iter().map(|n| n.node_id.as_str()).filter(|id| !consumed.contains(*id)).collect();
	if sinks.len() != 1 || sinks[0] != raw.sink_node_id {
		return Err(Error::SinkCountMismatch(sinks.len()));
	}

	let order = topological_order(&raw)?;

	let by_id: HashMap<&str, &RawNode> = raw.nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();

	let mut validated_nodes: Vec<PlanNode> = Vec::with_capacity(raw.nodes.len());
	let mut available: HashMap<String, HashSet<u32>> = HashMap::new();
	let seed_available = seed_keys(registries);

	for node_id in &order {
		let raw_node = by_id[node_id.as_str()];
		let spec = operators
			.find(&raw_node.op)
			.ok_or_else(|| Error::UnknownOperator {
				node: raw_node.node_id.clone(),
				op: raw_node.op.clone(),
			})?;

		let validated_params = validate_params(raw_node, spec, registries, &raw)?;

		let node_available: HashSet<u32> = if raw_node.inputs.is_empty() {
			seed_available.clone()
		} else {
			let mut set = HashSet::new();
			for input in &raw_node.inputs {
				set.extend(available[input].iter().copied());
			}
			set
		};

		let reads = (spec.reads_fn)(&validated_params);
		for key_id in &reads {
			// key id 0 is the intrinsic `id` column: not a registry entry,
			// always present on every batch (§3), so it skips both the
			// ancestor-provided check and the readability check below.
			if *key_id == 0 {
				continue;
			}
			if !node_available.contains(key_id) {
				let name = registries
					.key_by_id(*key_id)
					.map(|k| k.name.clone())
					.unwrap_or_else(|_| key_id.to_string());
				return Err(Error::UnsatisfiedRead {
					node: raw_node.node_id.clone(),
					key: name,
				});
			}
			let key = registries.key_by_id(*key_id)?;
			if !key.is_readable() {
				return Err(Error::NotReadable(key.name.clone()));
			}
		}

		let writes = (spec.writes_fn)(&validated_params);
		for key_id in &writes {
			if *key_id != 0 {
				let key = registries.key_by_id(*key_id)?;
				if !key.is_writable() {
					return Err(Error::NotWritable(key.name.clone()));
				}
			}
		}
		let mut after = node_available;
		after.extend(writes);
		available.insert(raw_node.node_id.clone(), after);

		validated_nodes.push(PlanNode {
			node_id: raw_node.node_id.clone(),
			op: raw_node.op.clone(),
			inputs: raw_node.inputs.clone(),
			validated_params,
			budget_ms: raw_node
				.budget
				.as_ref()
				.map(|b| b.timeout_ms)
				.unwrap_or(spec.default_budget_ms),
			trace: raw_node.trace.unwrap_or(false),
			project: raw_node.project.clone(),
		});
	}

	Ok(Plan {
		plan_name: raw.plan_name,
		nodes: validated_nodes,
		sink_node_id: raw.sink_node_id,
	})
}

fn check_digests(raw: &RawPlan, registries: &Registries) -> Result<()> {
	let want = registries.digests();
	if raw.digests.keys != want.keys {
		return Err(Error::DigestMismatch {
			which: "keys",
			plan_digest: raw.digests.keys.clone(),
			engine_digest: want.keys.clone(),
		});
	}
	if raw.digests.params != want.params {
		return Err(Error::DigestMismatch {
			which: "params",
			plan_digest: raw.digests.params.clone(),
			engine_digest: want.params.clone(),
		});
	}
	if raw.digests.features != want.features {
		return Err(Error::DigestMismatch {
			which: "features",
			plan_digest: raw.digests.features.clone(),
			engine_digest: want.features.clone(),
		});
	}
	Ok(())
}

/// The key ids available to a node with no inputs, before any operator has
/// run. The intrinsic `id` column (key id `0` by convention) is not a
/// registry entry and needs no propagation, so this starts empty: a source
/// node's own `writes_fn` is what actually seeds the available set.
fn seed_keys(_registries: &Registries) -> HashSet<u32> {
	HashSet::new()
}

/// Kahn's algorithm, with ties among simultaneously-ready nodes broken by
/// the node's position in the plan's declared `nodes` array, so that two
/// loads of the same plan always produce the same execution order.
fn topological_order(raw: &RawPlan) -> Result<Vec<String>> {
	let index_of: HashMap<&str, usize> =
		raw.nodes.iter().enumerate().map(|(i, n)| (n.node_id.as_str(), i)).collect();

	let mut in_degree: HashMap<&str, usize> =
		raw.nodes.iter().map(|n| (n.node_id.as_str(), n.inputs.len())).collect();
	let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
	for n in &raw.nodes {
		for input in &n.inputs {
			dependents.entry(input.as_str()).or_default().push(n.node_id.as_str());
		}
	}

	let mut ready: Vec<&str> =
		raw.nodes.iter().filter(|n| n.inputs.is_empty()).map(|n| n.node_id.as_str()).collect();
	ready.sort_by_key(|id| index_of[id]);

	let mut order = Vec::with_capacity(raw.nodes.len());
	let mut frontier = ready;
	while let Some(pos) = frontier
		.iter()
		.enumerate()
		.min_by_key(|(_, id)| index_of[*id])
		.map(|(pos, _)| pos)
	{
		let node_id = frontier.remove(pos);
		order.push(node_id.to_string());
		if let Some(deps) = dependents.get(node_id) {
			for dep in deps {
				let deg = in_degree.get_mut(dep).expect("dependent node exists");
				*deg -= 1;
				if *deg == 0 {
					frontier.push(dep);
				}
			}
		}
	}

	if order.len() != raw.nodes.len() {
		let stuck =
			raw.nodes.iter().find(|n| !order.contains(&n.node_id)).map(|n| n.node_id.clone());
		return Err(Error::CycleDetected(stuck.unwrap_or_default()));
	}

	Ok(order)
}

/// Type-checks a node's raw JSON params against its operator's schema,
/// resolving `pred_id`/`expr_id` references into the plan-local predicate
/// and expression tables and compiling any regexes they contain.
fn validate_params(
	raw_node: &RawNode,
	spec: &crate::registry::operator::OperatorSpec,
	_registries: &Registries,
	raw_plan: &RawPlan,
) -> Result<ValidatedParams> {
	if raw_node.inputs.len() < spec.min_inputs
		|| spec.max_inputs.map(|m| raw_node.inputs.len() > m).unwrap_or(false)
	{
		return Err(Error::InvalidParam {
			node: raw_node.node_id.clone(),
			detail: format!(
				"operator {} requires between {} and {:?} inputs, got {}",
				spec.op,
				spec.min_inputs,
				spec.max_inputs,
				raw_node.inputs.len()
			),
		});
	}

	let mut values = HashMap::new();
	let mut remaining: HashSet<String> = raw_node.params.keys().cloned().collect();

	for entry in &spec.params_schema {
		remaining.remove(entry.name);
		let raw_value = raw_node.params.get(entry.name);
		let value = match (raw_value, &entry.default_value) {
			(Some(v), _) => Some(parse_param_value(raw_node, entry, v, raw_plan)?),
			(None, Some(default)) => Some(value_to_param(entry.ty, default.clone())),
			(None, None) if entry.required => {
				return Err(Error::InvalidParam {
					node: raw_node.node_id.clone(),
					detail: format!("missing required parameter {}", entry.name),
				});
			}
			(None, None) => None,
		};
		if let Some(value) = value {
			values.insert(entry.name.to_string(), value);
		} else if !entry.nullable {
			return Err(Error::InvalidParam {
				node: raw_node.node_id.clone(),
				detail: format!("parameter {} is not nullable and has no value", entry.name),
			});
		}
	}

	if !remaining.is_empty() {
		return Err(Error::InvalidParam {
			node: raw_node.node_id.clone(),
			detail: format!("surplus parameters: {}", remaining.into_iter().collect::<Vec<_>>().join(", ")),
		});
	}

	Ok(ValidatedParams::new(values))
}

fn parse_param_value(
	raw_node: &RawNode,
	entry: &crate::registry::operator::ParamSchemaEntry,
	raw_value: &serde_json::Value,
	raw_plan: &RawPlan,
) -> Result<ParamValue> {
	match entry.ty {
		ParamType::Int => raw_value
			.as_i64()
			.map(ParamValue::Int)
			.ok_or_else(|| param_type_error(raw_node, entry.name, "Int")),
		ParamType::Float => raw_value
			.as_f64()
			.map(ParamValue::Float)
			.ok_or_else(|| param_type_error(raw_node, entry.name, "Float")),
		ParamType::String => raw_value
			.as_str()
			.map(|s| ParamValue::String(s.to_string()))
			.ok_or_else(|| param_type_error(raw_node, entry.name, "String")),
		ParamType::Bool => raw_value
			.as_bool()
			.map(ParamValue::Bool)
			.ok_or_else(|| param_type_error(raw_node, entry.name, "Bool")),
		ParamType::PredId => {
			let id = raw_value.as_str().ok_or_else(|| param_type_error(raw_node, entry.name, "PredId"))?;
			let raw_pred: &RawPredicate = raw_plan.predicates.get(id).ok_or_else(|| Error::InvalidParam {
				node: raw_node.node_id.clone(),
				detail: format!("unknown predicate id {id}"),
			})?;
			Ok(ParamValue::Pred(std::sync::Arc::new(raw_pred.compile()?)))
		}
		ParamType::ExprId => {
			let id = raw_value.as_str().ok_or_else(|| param_type_error(raw_node, entry.name, "ExprId"))?;
			let expr: &Expr = raw_plan.expressions.get(id).ok_or_else(|| Error::InvalidParam {
				node: raw_node.node_id.clone(),
				detail: format!("unknown expression id {id}"),
			})?;
			Ok(ParamValue::Expr(std::sync::Arc::new(expr.clone())))
		}
	}
}

fn value_to_param(ty: ParamType, value: Value) -> ParamValue {
	match (ty, value) {
		(ParamType::Int, Value::Int(v)) => ParamValue::Int(v),
		(ParamType::Float, Value::Float(v)) => ParamValue::Float(v),
		(ParamType::Float, Value::Int(v)) => ParamValue::Float(v as f64),
		(ParamType::String, Value::String(v)) => ParamValue::String(v),
		(ParamType::Bool, Value::Bool(v)) => ParamValue::Bool(v),
		(ty, v) => panic!("operator schema declared default of the wrong type {ty:?} for {v:?}"),
	}
}

fn param_type_error(raw_node: &RawNode, name: &str, expected: &str) -> Error {
	Error::InvalidParam {
		node: raw_node.node_id.clone(),
		detail: format!("parameter {name} must be {expected}"),
	}
}
