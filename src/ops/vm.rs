//! `vm` (virtual materialize): computes an expression per active row and
//! writes the result as a new column. The underlying batch is never mutated
//! in place — a new batch is derived sharing every existing column plus the
//! freshly computed one, and the output `RowSet` keeps the input's exact
//! selection and ordering.

use std::collections::HashSet;
use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::batch::{Column, FloatColumn};
use crate::ctx::ExecCtx;
use crate::err::{Error, Result};
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry, ParamType};
use crate::rowset::RowSet;

fn reads(params: &ValidatedParams) -> HashSet<u32> {
	params.expr("expr").map(|e| e.referenced_keys()).unwrap_or_default()
}

fn writes(params: &ValidatedParams) -> HashSet<u32> {
	let mut out = HashSet::new();
	if let Ok(out_key) = params.int("out_key") {
		out.insert(out_key as u32);
	}
	out
}

fn run(inputs: &[RowSet], params: &ValidatedParams, ctx: &ExecCtx) -> Result<RowSet> {
	let input = &inputs[0];
	let expr = params.expr("expr")?;
	let out_key = params.int("out_key")? as u32;
	let batch = input.batch();

	let mut values = vec![0.0f64; batch.size()];
	let mut valid = RoaringBitmap::new();
	for idx in input.active_rows() {
		if let Some(v) = expr.eval(idx, batch, ctx)? {
			let f = v.as_f64().ok_or_else(|| Error::Operator {
				op: "vm".into(),
				detail: format!("expression result is not numeric: {v:?}"),
			})?;
			values[idx] = f;
			valid.insert(idx as u32);
		}
	}

	let new_batch = Arc::new(batch.with_column(
		out_key,
		Column::Float(FloatColumn {
			values,
			valid,
		}),
	));
	Ok(input.with_batch_same_selection(new_batch))
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "vm",
		params_schema: vec![
			ParamSchemaEntry {
				name: "expr",
				ty: ParamType::ExprId,
				required: true,
				nullable: false,
				default_value: None,
			},
			ParamSchemaEntry {
				name: "out_key",
				ty: ParamType::Int,
				required: true,
				nullable: false,
				default_value: None,
			},
		],
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 1000,
		output_pattern: OutputPattern::UnaryPreserveView,
		writes_effect: Some("writes out_key for every active row whose expression did not evaluate to null"),
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
	use crate::expr::{BinOp, Expr};
	use crate::plan::ParamValue;
	use crate::value::Value;
	use std::collections::HashMap;

	#[test]
	fn writes_computed_column_without_mutating_input() {
		let mut b = RowBatch::builder(2);
		b.push_id(3);
		b.push_id(4);
		let input = RowSet::full(Arc::new(b.build()));

		let expr = Expr::Binop {
			op: BinOp::Mul,
			lhs: Box::new(Expr::ParamRef {
				param_id: 1,
			}),
			rhs: Box::new(Expr::Const {
				value: Value::Float(2.0),
			}),
		};
		let mut param_values = HashMap::new();
		param_values.insert(1u32, Value::Float(5.0));
		let ctx = ExecCtx::new(param_values, 120);

		let mut values = HashMap::new();
		values.insert("expr".to_string(), ParamValue::Expr(std::sync::Arc::new(expr)));
		values.insert("out_key".to_string(), ParamValue::Int(7));
		let params = ValidatedParams::new(values);

		let input_batch_ptr = std::sync::Arc::as_ptr(input.batch());
		let out = run(&[input], &params, &ctx).unwrap();
		assert_ne!(std::sync::Arc::as_ptr(out.batch()), input_batch_ptr);
		assert_eq!(out.batch().float_cell(7, 0).unwrap(), Some(10.0));
		assert_eq!(out.batch().float_cell(7, 1).unwrap(), Some(10.0));
	}
}
