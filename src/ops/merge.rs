//! `merge`: concatenates two or more inputs in input order, de-duplicating
//! by id across *all* inputs with a first-occurrence-wins policy.

use std::collections::HashSet;

use crate::ctx::ExecCtx;
use crate::err::{Error, Result};
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry};
use crate::rowset::RowSet;

fn reads(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn writes(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn run(inputs: &[RowSet], _params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let first = inputs.first().ok_or_else(|| Error::Operator {
		op: "merge".into(),
		detail: "merge requires at least one input".into(),
	})?;

	// A merged output is a single RowSet over a single RowBatch, so every
	// input must in fact share the same upstream batch (merge only ever
	// sits over branches of the same DAG in a well-formed plan) — verified
	// here rather than assumed, since nothing upstream of this operator
	// enforces it.
	for input in &inputs[1..] {
		if !std::sync::Arc::ptr_eq(input.batch(), first.batch()) {
			return Err(Error::Operator {
				op: "merge".into(),
				detail: "merge inputs do not share a common upstream batch".into(),
			});
		}
	}

	let mut seen = HashSet::new();
	let mut kept = Vec::new();
	for input in inputs {
		let batch = input.batch();
		for idx in input.to_vector() {
			let id = batch.get_id(idx)?;
			if seen.insert(id) {
				kept.push(idx);
			}
		}
	}
	Ok(first.with_ordered_selection(kept))
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "merge",
		params_schema: Vec::<ParamSchemaEntry>::new(),
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 1000,
		output_pattern: OutputPattern::NAryMerge,
		writes_effect: None,
		is_io: false,
		run,
		run_async: None,
		min_inputs: 2,
		max_inputs: None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::RowBatch;
	use std::collections::HashMap;
	use std::sync::Arc;

	#[test]
	fn dedups_across_all_inputs_first_wins() {
		let mut b = RowBatch::builder(4);
		b.push_id(1);
		b.push_id(2);
		b.push_id(2);
		b.push_id(3);
		let batch = Arc::new(b.build());

		let a = RowSet::full(Arc::clone(&batch)).with_ordered_selection(vec![0, 1]);
		let b2 = RowSet::full(Arc::clone(&batch)).with_ordered_selection(vec![2, 3]);
		let params = ValidatedParams::new(HashMap::new());
		let ctx = ExecCtx::new(HashMap::new(), 120);

		let out = run(&[a, b2], &params, &ctx).unwrap();
		// id=2 appears at idx 1 and idx 2; idx 1 (from the first input) wins.
		assert_eq!(out.to_vector(), vec![0, 1, 3]);
	}

	#[test]
	fn rejects_inputs_from_different_batches() {
		let mut b1 = RowBatch::builder(2);
		b1.push_id(1);
		b1.push_id(2);
		let mut b2 = RowBatch::builder(2);
		b2.push_id(10);
		b2.push_id(20);

		let a = RowSet::full(Arc::new(b1.build()));
		let b = RowSet::full(Arc::new(b2.build()));
		let params = ValidatedParams::new(HashMap::new());
		let ctx = ExecCtx::new(HashMap::new(), 120);

		assert!(run(&[a, b], &params, &ctx).is_err());
	}
}
