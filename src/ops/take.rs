//! `take`: keeps the first `count` rows of the input's current order. If the
//! input's order is not semantically meaningful, falls back to the natural
//! (ascending row-index) order via `RowSet::to_vector`.

use std::collections::HashSet;

use crate::ctx::ExecCtx;
use crate::err::Result;
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry, ParamType};
use crate::rowset::RowSet;

fn reads(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn writes(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn run(inputs: &[RowSet], params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let input = &inputs[0];
	let count = params.int("count")?.max(0) as usize;
	let ordered = input.to_vector();
	let kept: Vec<usize> = ordered.into_iter().take(count).collect();
	Ok(input.with_ordered_selection(kept))
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "take",
		params_schema: vec![ParamSchemaEntry {
			name: "count",
			ty: ParamType::Int,
			required: true,
			nullable: false,
			default_value: None,
		}],
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 500,
		output_pattern: OutputPattern::StableFilter,
		writes_effect: None,
		is_io: false,
		run,
		run_async: None,
		min_inputs: 1,
		max_inputs: Some(1),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::RowBatch;
	use crate::plan::ParamValue;
	use std::collections::HashMap;
	use std::sync::Arc;

	#[test]
	fn keeps_first_n_in_order() {
		let mut b = RowBatch::builder(5);
		for id in 1..=5 {
			b.push_id(id);
		}
		let input = RowSet::full(Arc::new(b.build()));
		let mut values = HashMap::new();
		values.insert("count".to_string(), ParamValue::Int(3));
		let params = ValidatedParams::new(values);
		let ctx = ExecCtx::new(HashMap::new(), 120);

		let out = run(&[input], &params, &ctx).unwrap();
		assert_eq!(out.to_vector(), vec![0, 1, 2]);
	}

	#[test]
	fn count_larger_than_input_keeps_all() {
		let mut b = RowBatch::builder(2);
		b.push_id(1);
		b.push_id(2);
		let input = RowSet::full(Arc::new(b.build()));
		let mut values = HashMap::new();
		values.insert("count".to_string(), ParamValue::Int(10));
		let params = ValidatedParams::new(values);
		let ctx = ExecCtx::new(HashMap::new(), 120);

		let out = run(&[input], &params, &ctx).unwrap();
		assert_eq!(out.len(), 2);
	}
}
