//! The predicate tree and its evaluator. Unlike expressions, a predicate
//! always yields a plain `bool`: any underlying null collapses the result to
//! `false` ("null-as-false"), except `is_null` itself, which is the only
//! form that turns a null cell into `true`.

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::batch::RowBatch;
use crate::ctx::ExecCtx;
use crate::err::{Error, Result};
use crate::expr::Expr;
use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
	Lt,
	Le,
	Eq,
	Ne,
	Ge,
	Gt,
}

/// The wire shape of a predicate, as it appears in a plan artifact: a regex
/// pattern is still just a string here, not yet compiled.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawPredicate {
	Cmp {
		op: CmpOp,
		lhs: Expr,
		rhs: Expr,
	},
	And {
		preds: Vec<RawPredicate>,
	},
	Or {
		preds: Vec<RawPredicate>,
	},
	Not {
		pred: Box<RawPredicate>,
	},
	Regex {
		key_id: u32,
		pattern: String,
	},
	In {
		key_id: u32,
		values: Vec<Value>,
	},
	IsNull {
		key_id: u32,
	},
}

impl RawPredicate {
	/// Compiles every `regex` node's pattern exactly once, at plan-load time,
	/// producing the runtime [`Predicate`] tree the scheduler actually
	/// evaluates per row.
	pub fn compile(&self) -> Result<Predicate> {
		Ok(match self {
			RawPredicate::Cmp {
				op,
				lhs,
				rhs,
			} => Predicate::Cmp {
				op: *op,
				lhs: lhs.clone(),
				rhs: rhs.clone(),
			},
			RawPredicate::And {
				preds,
			} => Predicate::And {
				preds: preds.iter().map(RawPredicate::compile).collect::<Result<_>>()?,
			},
			RawPredicate::Or {
				preds,
			} => Predicate::Or {
				preds: preds.iter().map(RawPredicate::compile).collect::<Result<_>>()?,
			},
			RawPredicate::Not {
				pred,
			} => Predicate::Not {
				pred: Box::new(pred.compile()?),
			},
			RawPredicate::Regex {
				key_id,
				pattern,
			} => Predicate::Regex {
				key_id: *key_id,
				compiled: Arc::new(Regex::new(pattern).map_err(|e| Error::InvalidRegex {
					pattern: pattern.clone(),
					detail: e.to_string(),
				})?),
			},
			RawPredicate::In {
				key_id,
				values,
			} => Predicate::In {
				key_id: *key_id,
				values: values.clone(),
			},
			RawPredicate::IsNull {
				key_id,
			} => Predicate::IsNull {
				key_id: *key_id,
			},
		})
	}
}

/// The runtime predicate tree: identical shape to [`RawPredicate`] except
/// `regex` carries a pre-compiled, shared [`Regex`].
#[derive(Clone, Debug)]
pub enum Predicate {
	Cmp {
		op: CmpOp,
		lhs: Expr,
		rhs: Expr,
	},
	And {
		preds: Vec<Predicate>,
	},
	Or {
		preds: Vec<Predicate>,
	},
	Not {
		pred: Box<Predicate>,
	},
	Regex {
		key_id: u32,
		compiled: Arc<Regex>,
	},
	In {
		key_id: u32,
		values: Vec<Value>,
	},
	IsNull {
		key_id: u32,
	},
}

impl Predicate {
	/// Collects every key id referenced anywhere in this predicate tree
	/// (including inside its expression children), for the plan loader's
	/// static effect propagation (§4.G).
	pub fn referenced_keys(&self) -> std::collections::HashSet<u32> {
		let mut out = std::collections::HashSet::new();
		self.collect_keys(&mut out);
		out
	}

	fn collect_keys(&self, out: &mut std::collections::HashSet<u32>) {
		match self {
			Predicate::Cmp {
				lhs,
				rhs,
				..
			} => {
				out.extend(lhs.referenced_keys());
				out.extend(rhs.referenced_keys());
			}
			Predicate::And {
				preds,
			}
			| Predicate::Or {
				preds,
			} => {
				for p in preds {
					p.collect_keys(out);
				}
			}
			Predicate::Not {
				pred,
			} => pred.collect_keys(out),
			Predicate::Regex {
				key_id,
				..
			}
			| Predicate::In {
				key_id,
				..
			}
			| Predicate::IsNull {
				key_id,
			} => {
				out.insert(*key_id);
			}
		}
	}

	pub fn eval(&self, row_idx: usize, batch: &RowBatch, ctx: &ExecCtx) -> Result<bool> {
		match self {
			Predicate::Cmp {
				op,
				lhs,
				rhs,
			} => {
				let l = lhs.eval(row_idx, batch, ctx)?;
				let r = rhs.eval(row_idx, batch, ctx)?;
				let (l, r) = match (l, r) {
					(Some(l), Some(r)) => (l, r),
					_ => return Ok(false),
				};
				let ord = compare_values(&l, &r)?;
				Ok(match op {
					CmpOp::Lt => ord == Ordering::Less,
					CmpOp::Le => ord != Ordering::Greater,
					CmpOp::Eq => ord == Ordering::Equal,
					CmpOp::Ne => ord != Ordering::Equal,
					CmpOp::Ge => ord != Ordering::Less,
					CmpOp::Gt => ord == Ordering::Greater,
				})
			}
			Predicate::And {
				preds,
			} => {
				for p in preds {
					if !p.eval(row_idx, batch, ctx)? {
						return Ok(false);
					}
				}
				Ok(true)
			}
			Predicate::Or {
				preds,
			} => {
				for p in preds {
					if p.eval(row_idx, batch, ctx)? {
						return Ok(true);
					}
				}
				Ok(false)
			}
			Predicate::Not {
				pred,
			} => Ok(!pred.eval(row_idx, batch, ctx)?),
			Predicate::Regex {
				key_id,
				compiled,
			} => match batch.string_cell(*key_id, row_idx)? {
				Some(s) => Ok(compiled.is_match(s)),
				None => Ok(false),
			},
			Predicate::In {
				key_id,
				values,
			} => match batch.value_cell(*key_id, row_idx)? {
				Some(v) => Ok(values.contains(&v)),
				None => Ok(false),
			},
			Predicate::IsNull {
				key_id,
			} => Ok(batch.value_cell(*key_id, row_idx)?.is_none()),
		}
	}
}

/// Orders two scalar values for comparison predicates. Numeric values widen
/// to `f64` regardless of `Int`/`Float` origin; strings and bools compare
/// within their own type. Comparing across incompatible types is an error —
/// a plan that does this is malformed, not merely producing a false result.
fn compare_values(l: &Value, r: &Value) -> Result<Ordering> {
	match (l, r) {
		(Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
		(Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
		_ => {
			let (a, b) = (l.as_f64(), r.as_f64());
			match (a, b) {
				(Some(a), Some(b)) => {
					a.partial_cmp(&b).ok_or_else(|| Error::Internal("NaN in comparison".into()))
				}
				_ => Err(Error::Internal(format!(
					"cannot compare {} with {}",
					l.type_name(),
					r.type_name()
				))),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn ctx() -> ExecCtx {
		ExecCtx::new(HashMap::new(), 120)
	}

	#[test]
	fn null_operand_makes_cmp_false() {
		let mut b = RowBatch::builder(1);
		b.push_id(1);
		let batch = b.build().with_column(
			5,
			crate::batch::Column::Float(crate::batch::FloatColumn {
				values: vec![0.0],
				valid: roaring::RoaringBitmap::new(),
			}),
		);
		let pred = RawPredicate::Cmp {
			op: CmpOp::Ge,
			lhs: Expr::KeyRef {
				key_id: 5,
			},
			rhs: Expr::Const {
				value: Value::Float(0.0),
			},
		}
		.compile()
		.unwrap();
		assert!(!pred.eval(0, &batch, &ctx()).unwrap());
	}

	#[test]
	fn is_null_true_on_missing_cell() {
		let mut b = RowBatch::builder(1);
		b.push_id(1);
		let batch = b.build().with_column(
			5,
			crate::batch::Column::Float(crate::batch::FloatColumn {
				values: vec![0.0],
				valid: roaring::RoaringBitmap::new(),
			}),
		);
		let pred = RawPredicate::IsNull {
			key_id: 5,
		}
		.compile()
		.unwrap();
		assert!(pred.eval(0, &batch, &ctx()).unwrap());
	}

	#[test]
	fn regex_non_match_on_null_string() {
		let mut b = RowBatch::builder(1);
		b.push_id(1);
		let batch = b.build().with_column(
			2,
			crate::batch::Column::StringDict(crate::batch::StringDictColumn {
				codes: vec![0],
				valid: roaring::RoaringBitmap::new(),
				dict: std::sync::Arc::new(vec!["US".to_string()]),
			}),
		);
		let pred = RawPredicate::Regex {
			key_id: 2,
			pattern: "US".to_string(),
		}
		.compile()
		.unwrap();
		assert!(!pred.eval(0, &batch, &ctx()).unwrap());
	}
}
