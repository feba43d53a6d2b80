//! `filter`: keeps active rows for which the configured predicate holds.
//! Output pattern is `StableFilter` — the relative order of surviving rows
//! matches their relative order in the input, whether or not the input's
//! own order was itself meaningful.

use std::collections::HashSet;

use crate::ctx::ExecCtx;
use crate::err::Result;
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry, ParamType};
use crate::rowset::RowSet;

fn reads(params: &ValidatedParams) -> HashSet<u32> {
	params.pred("pred").map(|p| p.referenced_keys()).unwrap_or_default()
}

fn writes(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn run(inputs: &[RowSet], params: &ValidatedParams, ctx: &ExecCtx) -> Result<RowSet> {
	let input = &inputs[0];
	let pred = params.pred("pred")?;
	let batch = input.batch();

	let mut kept = Vec::new();
	for idx in input.to_vector() {
		if pred.eval(idx, batch, ctx)? {
			kept.push(idx);
		}
	}
	Ok(input.with_ordered_selection(kept))
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "filter",
		params_schema: vec![ParamSchemaEntry {
			name: "pred",
			ty: ParamType::PredId,
			required: true,
			nullable: false,
			default_value: None,
		}],
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 1000,
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
	use crate::expr::Expr;
	use crate::pred::{CmpOp, RawPredicate};
	use crate::plan::ParamValue;
	use crate::value::Value;
	use std::collections::HashMap;
	use std::sync::Arc;

	#[test]
	fn keeps_rows_in_stable_order() {
		let mut b = RowBatch::builder(3);
		b.push_id(10);
		b.push_id(20);
		b.push_id(30);
		let batch = Arc::new(b.build());
		let input = RowSet::full(batch);

		let pred = RawPredicate::Cmp {
			op: CmpOp::Ge,
			lhs: Expr::Const {
				value: Value::Float(15.0),
			},
			rhs: Expr::Const {
				value: Value::Float(10.0),
			},
		}
		.compile()
		.unwrap();
		let mut values = HashMap::new();
		values.insert("pred".to_string(), ParamValue::Pred(Arc::new(pred)));
		let params = ValidatedParams::new(values);
		let ctx = ExecCtx::new(HashMap::new(), 120);

		let out = run(&[input], &params, &ctx).unwrap();
		assert_eq!(out.to_vector(), vec![0, 1, 2]);
	}
}
