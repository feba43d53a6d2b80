//! The expression tree and its evaluator. Expressions read columns, read
//! resolved registry parameters, and combine them arithmetically under a
//! three-valued (non-null / non-null / null) semantics: any null operand
//! makes the whole sub-expression null, rather than raising an error.

use serde::{Deserialize, Serialize};

use crate::batch::RowBatch;
use crate::ctx::ExecCtx;
use crate::err::{Error, Result};
use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
	Add,
	Sub,
	Mul,
	Div,
	Mod,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
	Const {
		value: Value,
	},
	KeyRef {
		key_id: u32,
	},
	ParamRef {
		param_id: u32,
	},
	Binop {
		op: BinOp,
		lhs: Box<Expr>,
		rhs: Box<Expr>,
	},
	Coalesce {
		expr: Box<Expr>,
		default: Value,
	},
}

impl Expr {
	pub fn eval(&self, row_idx: usize, batch: &RowBatch, ctx: &ExecCtx) -> Result<Option<Value>> {
		self.eval_depth(row_idx, batch, ctx, 0)
	}

	/// Collects every key id referenced anywhere in this expression tree,
	/// used by the plan loader's static effect propagation (§4.G).
	pub fn referenced_keys(&self) -> std::collections::HashSet<u32> {
		let mut out = std::collections::HashSet::new();
		self.collect_keys(&mut out);
		out
	}

	fn collect_keys(&self, out: &mut std::collections::HashSet<u32>) {
		match self {
			Expr::Const {
				..
			}
			| Expr::ParamRef {
				..
			} => {}
			Expr::KeyRef {
				key_id,
			} => {
				out.insert(*key_id);
			}
			Expr::Binop {
				lhs,
				rhs,
				..
			} => {
				lhs.collect_keys(out);
				rhs.collect_keys(out);
			}
			Expr::Coalesce {
				expr,
				..
			} => expr.collect_keys(out),
		}
	}

	fn eval_depth(
		&self,
		row_idx: usize,
		batch: &RowBatch,
		ctx: &ExecCtx,
		depth: u32,
	) -> Result<Option<Value>> {
		if depth > ctx.depth_limit() {
			return Err(Error::DepthLimitExceeded(ctx.depth_limit()));
		}
		match self {
			Expr::Const {
				value,
			} => Ok(Some(value.clone())),
			Expr::KeyRef {
				key_id,
			} => batch.value_cell(*key_id, row_idx),
			Expr::ParamRef {
				param_id,
			} => ctx
				.param(*param_id)
				.cloned()
				.map(Some)
				.ok_or_else(|| Error::UnboundParam(param_id.to_string())),
			Expr::Binop {
				op,
				lhs,
				rhs,
			} => {
				let l = lhs.eval_depth(row_idx, batch, ctx, depth + 1)?;
				let r = rhs.eval_depth(row_idx, batch, ctx, depth + 1)?;
				let (l, r) = match (l, r) {
					(Some(l), Some(r)) => (l, r),
					_ => return Ok(None),
				};
				let lf = l
					.as_f64()
					.ok_or_else(|| Error::Internal(format!("binop lhs is not numeric: {l:?}")))?;
				let rf = r
					.as_f64()
					.ok_or_else(|| Error::Internal(format!("binop rhs is not numeric: {r:?}")))?;
				Ok(apply_binop(*op, lf, rf).map(Value::Float))
			}
			Expr::Coalesce {
				expr,
				default,
			} => match expr.eval_depth(row_idx, batch, ctx, depth + 1)? {
				Some(v) => Ok(Some(v)),
				None => Ok(Some(default.clone())),
			},
		}
	}
}

/// Applies a binary arithmetic op. Division/modulo by zero yield `None`
/// (null) rather than infinity or NaN, so that downstream comparisons stay
/// well-defined instead of silently propagating non-comparable floats.
fn apply_binop(op: BinOp, l: f64, r: f64) -> Option<f64> {
	match op {
		BinOp::Add => Some(l + r),
		BinOp::Sub => Some(l - r),
		BinOp::Mul => Some(l * r),
		BinOp::Div => {
			if r == 0.0 {
				None
			} else {
				Some(l / r)
			}
		}
		BinOp::Mod => {
			if r == 0.0 {
				None
			} else {
				Some(l % r)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::RowBatch;
	use std::collections::HashMap;

	fn ctx() -> ExecCtx {
		ExecCtx::new(HashMap::new(), 120)
	}

	#[test]
	fn const_and_binop() {
		let batch = RowBatch::builder(1).build();
		let e = Expr::Binop {
			op: BinOp::Add,
			lhs: Box::new(Expr::Const {
				value: Value::Float(1.0),
			}),
			rhs: Box::new(Expr::Const {
				value: Value::Float(2.0),
			}),
		};
		assert_eq!(e.eval(0, &batch, &ctx()).unwrap(), Some(Value::Float(3.0)));
	}

	#[test]
	fn division_by_zero_is_null() {
		let batch = RowBatch::builder(1).build();
		let e = Expr::Binop {
			op: BinOp::Div,
			lhs: Box::new(Expr::Const {
				value: Value::Float(1.0),
			}),
			rhs: Box::new(Expr::Const {
				value: Value::Float(0.0),
			}),
		};
		assert_eq!(e.eval(0, &batch, &ctx()).unwrap(), None);
	}

	#[test]
	fn coalesce_substitutes_default_on_null() {
		let mut b = RowBatch::builder(1);
		b.push_id(1);
		let batch = b.build();
		let e = Expr::Coalesce {
			expr: Box::new(Expr::KeyRef {
				key_id: 99,
			}),
			default: Value::Float(0.2),
		};
		// key 99 has no column at all, which is a hard error, not null —
		// coalesce only substitutes for a populated-but-invalid cell.
		assert!(e.eval(0, &batch, &ctx()).is_err());
	}
}
