//! Integration tests against the crate's public API, covering the
//! concrete scenarios and cross-cutting invariants laid out in the
//! specification's testable-properties section: deterministic execution,
//! override handling, regex filtering, deadlines, and fail-fast
//! cancellation.

use std::time::Instant;

use rankcore::dbs::Scheduler;
use rankcore::ctx::ExecCtx;
use rankcore::expr::{BinOp, Expr};
use rankcore::ops;
use rankcore::plan::loader;
use rankcore::pred::{CmpOp, RawPredicate};
use rankcore::registry::Registries;
use rankcore::value::Value;
use rankcore::cnf;

/// The `reels_a`-shaped plan used by S1/S2: `follow -> vm -> filter -> take`.
/// `final_score = id * coalesce(P.media_age_penalty_weight, 0.2)`.
fn reels_plan_json(registries: &Registries) -> String {
	let expr = Expr::Binop {
		op: BinOp::Mul,
		lhs: Box::new(Expr::KeyRef {
			key_id: 0,
		}),
		rhs: Box::new(Expr::Coalesce {
			expr: Box::new(Expr::ParamRef {
				param_id: 1,
			}),
			default: Value::Float(0.2),
		}),
	};
	let pred = RawPredicate::Cmp {
		op: CmpOp::Ge,
		lhs: Expr::KeyRef {
			key_id: 3,
		},
		rhs: Expr::Const {
			value: Value::Float(0.6),
		},
	};

	let plan = serde_json::json!({
		"plan_name": "reels_a",
		"sink_node_id": "take",
		"digests": registries.digests(),
		"built_by": {"backend": "test", "tool": "scenarios", "tool_version": "0"},
		"expressions": {"final_score_expr": expr},
		"predicates": {"score_pred": pred},
		"nodes": [
			{"node_id": "follow", "op": "source.follow", "inputs": [], "params": {"fanout": 10}},
			{"node_id": "vm", "op": "vm", "inputs": ["follow"], "params": {"expr": "final_score_expr", "out_key": 3}},
			{"node_id": "filter", "op": "filter", "inputs": ["vm"], "params": {"pred": "score_pred"}},
			{"node_id": "take", "op": "take", "inputs": ["filter"], "params": {"count": 5}},
		],
	});
	plan.to_string()
}

fn regex_plan_json(registries: &Registries) -> String {
	let pred = RawPredicate::Regex {
		key_id: 2,
		pattern: "US".to_string(),
	};
	let plan = serde_json::json!({
		"plan_name": "regex_scan",
		"sink_node_id": "take",
		"digests": registries.digests(),
		"built_by": {"backend": "test", "tool": "scenarios", "tool_version": "0"},
		"expressions": {},
		"predicates": {"country_pred": pred},
		"nodes": [
			{"node_id": "follow", "op": "source.follow", "inputs": [], "params": {"fanout": 10, "country_key": 2}},
			{"node_id": "filter", "op": "filter", "inputs": ["follow"], "params": {"pred": "country_pred"}},
			{"node_id": "take", "op": "take", "inputs": ["filter"], "params": {"count": 5}},
		],
	});
	plan.to_string()
}

/// Mirrors `main.rs::build_exec_ctx`: every registered parameter's default
/// value, so a plan's `coalesce` over an unset param resolves the same way
/// it does on the production path instead of erroring with `UnboundParam`.
fn default_param_values(registries: &Registries) -> std::collections::HashMap<u32, Value> {
	let mut values = std::collections::HashMap::new();
	for param in registries.params() {
		if let Some(default) = &param.default_value {
			values.insert(param.id, default.clone());
		}
	}
	values
}

fn default_exec_ctx(registries: &Registries) -> ExecCtx {
	ExecCtx::new(default_param_values(registries), *cnf::MAX_COMPUTATION_DEPTH)
}

fn exec_ctx_with_override(registries: &Registries, name: &str, value: Value) -> ExecCtx {
	let mut values = default_param_values(registries);
	let param = registries.param_by_name(name).unwrap();
	values.insert(param.id, value);
	ExecCtx::new(values, *cnf::MAX_COMPUTATION_DEPTH)
}

#[tokio::test]
async fn s1_reels_a_default_weight() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let text = reels_plan_json(&registries);
	let plan = loader::load_and_validate(&text, &registries, &operators).unwrap();

	let scheduler = Scheduler::new(&plan, &operators);
	let (sink, _trace) = scheduler.execute(default_exec_ctx(&registries)).await.unwrap();

	let ids: Vec<i64> = sink
		.materialize_index_view_for_output()
		.into_iter()
		.map(|idx| sink.batch().get_id(idx).unwrap())
		.collect();
	assert_eq!(ids, vec![3, 4, 5, 6, 7]);

	let scores: Vec<f64> = sink
		.materialize_index_view_for_output()
		.into_iter()
		.map(|idx| sink.batch().float_cell(3, idx).unwrap().unwrap())
		.collect();
	for (score, expected) in scores.iter().zip([0.6, 0.8, 1.0, 1.2, 1.4]) {
		assert!((score - expected).abs() < 1e-9, "{score} vs {expected}");
	}
}

#[tokio::test]
async fn s2_reels_a_with_override() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let text = reels_plan_json(&registries);
	let plan = loader::load_and_validate(&text, &registries, &operators).unwrap();

	let ctx = exec_ctx_with_override(&registries, "media_age_penalty_weight", Value::Float(0.5));
	let scheduler = Scheduler::new(&plan, &operators);
	let (sink, _trace) = scheduler.execute(ctx).await.unwrap();

	let ids: Vec<i64> = sink
		.materialize_index_view_for_output()
		.into_iter()
		.map(|idx| sink.batch().get_id(idx).unwrap())
		.collect();
	assert_eq!(ids, vec![2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn s1_is_deterministic_across_runs() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let text = reels_plan_json(&registries);

	let mut runs = Vec::new();
	for _ in 0..3 {
		let plan = loader::load_and_validate(&text, &registries, &operators).unwrap();
		let scheduler = Scheduler::new(&plan, &operators);
		let (sink, _trace) = scheduler.execute(default_exec_ctx(&registries)).await.unwrap();
		let ids: Vec<i64> = sink
			.materialize_index_view_for_output()
			.into_iter()
			.map(|idx| sink.batch().get_id(idx).unwrap())
			.collect();
		runs.push(ids);
	}
	assert!(runs.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn s3_regex_filters_by_country() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let text = regex_plan_json(&registries);
	let plan = loader::load_and_validate(&text, &registries, &operators).unwrap();

	let scheduler = Scheduler::new(&plan, &operators);
	let (sink, _trace) = scheduler.execute(default_exec_ctx(&registries)).await.unwrap();

	let ids: Vec<i64> = sink
		.materialize_index_view_for_output()
		.into_iter()
		.map(|idx| sink.batch().get_id(idx).unwrap())
		.collect();
	assert_eq!(ids, vec![1, 3, 5, 7, 9]);
}

#[cfg(feature = "test-ops")]
#[tokio::test]
async fn s4_deadline_exceeded_within_bound() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let plan_json = serde_json::json!({
		"plan_name": "deadline_probe",
		"sink_node_id": "busy",
		"digests": registries.digests(),
		"built_by": {"backend": "test", "tool": "scenarios", "tool_version": "0"},
		"expressions": {},
		"predicates": {},
		"nodes": [
			{"node_id": "follow", "op": "source.follow", "inputs": [], "params": {"fanout": 1}},
			{"node_id": "busy", "op": "busy_cpu", "inputs": ["follow"], "params": {"busy_wait_ms": 200}, "budget": {"timeout_ms": 50}},
		],
	})
	.to_string();
	let plan = loader::load_and_validate(&plan_json, &registries, &operators).unwrap();

	let started = Instant::now();
	let scheduler = Scheduler::new(&plan, &operators);
	let result = scheduler.execute(default_exec_ctx(&registries)).await;
	let elapsed = started.elapsed();

	assert!(result.is_err());
	assert!(matches!(result.unwrap_err(), rankcore::err::Error::DeadlineExceeded { .. }));
	assert!(elapsed.as_millis() < 500, "took {elapsed:?}");
}

#[cfg(feature = "test-ops")]
#[tokio::test]
async fn s5_fail_fast_cancels_long_sibling() {
	let registries = Registries::builtin();
	let operators = ops::build_registry();
	let plan_json = serde_json::json!({
		"plan_name": "fail_fast_probe",
		"sink_node_id": "merge",
		"digests": registries.digests(),
		"built_by": {"backend": "test", "tool": "scenarios", "tool_version": "0"},
		"expressions": {},
		"predicates": {},
		"nodes": [
			{"node_id": "follow", "op": "source.follow", "inputs": [], "params": {"fanout": 3}},
			{"node_id": "short", "op": "sleep", "inputs": ["follow"], "params": {"duration_ms": 50, "fail_after_sleep": true}},
			{"node_id": "long", "op": "sleep", "inputs": ["follow"], "params": {"duration_ms": 1000, "fail_after_sleep": false}},
			{"node_id": "merge", "op": "merge", "inputs": ["short", "long"], "params": {}},
		],
	})
	.to_string();
	let plan = loader::load_and_validate(&plan_json, &registries, &operators).unwrap();

	let started = Instant::now();
	let scheduler = Scheduler::new(&plan, &operators);
	let result = scheduler.execute(default_exec_ctx(&registries)).await;
	let elapsed = started.elapsed();

	assert!(result.is_err());
	assert!(elapsed.as_millis() < 500, "fail-fast did not cut the long sleep short: {elapsed:?}");
}
