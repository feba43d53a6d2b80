//! `sort`: a stable sort over the input's active rows by a single key.
//! Nulls sort after non-nulls regardless of direction ("nulls-last"), and
//! ties among equal keys preserve their relative input order — this is what
//! makes the overall pipeline deterministic run over run.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::batch::{Column, RowBatch};
use crate::ctx::ExecCtx;
use crate::err::{Error, Result};
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry, ParamType};
use crate::rowset::RowSet;

/// Sentinel `by` value meaning "sort by the intrinsic `id` column" rather
/// than a registered key — `id` is not itself a registry entry.
const BY_INTRINSIC_ID: i64 = 0;

fn reads(params: &ValidatedParams) -> HashSet<u32> {
	match params.int("by") {
		Ok(BY_INTRINSIC_ID) | Err(_) => HashSet::new(),
		Ok(by) => {
			let mut s = HashSet::new();
			s.insert(by as u32);
			s
		}
	}
}

fn writes(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

#[derive(Copy, Clone)]
enum SortKey {
	Int(Option<i64>),
	Float(Option<f64>),
	Str(Option<usize>),
}

fn key_for(batch: &RowBatch, by: i64, idx: usize) -> Result<SortKey> {
	if by == BY_INTRINSIC_ID {
		return Ok(SortKey::Int(if batch.is_id_valid(idx) {
			Some(batch.get_id(idx)?)
		} else {
			None
		}));
	}
	let key_id = by as u32;
	match batch.column(key_id) {
		Some(Column::Float(_)) => Ok(SortKey::Float(batch.float_cell(key_id, idx)?)),
		Some(Column::StringDict(c)) => {
			// compare by dictionary code's string value lazily via index into
			// dict; cheaper to compare code+dict only when codes differ, but
			// correctness first: resolve to the owned string position.
			Ok(SortKey::Str(if c.valid.contains(idx as u32) {
				Some(c.codes[idx] as usize)
			} else {
				None
			}))
		}
		Some(Column::Bool(_)) | Some(Column::FeatureBundle(_)) => {
			Err(Error::Operator {
				op: "sort".into(),
				detail: format!("key {key_id} is not a sortable type"),
			})
		}
		None => Err(Error::MissingColumn(key_id.to_string())),
	}
}

fn compare_keys(a: &SortKey, b: &SortKey, desc: bool, dict: Option<&[String]>) -> Ordering {
	let ord = match (a, b) {
		(SortKey::Int(None), SortKey::Int(None)) => Ordering::Equal,
		(SortKey::Int(None), SortKey::Int(Some(_))) => return Ordering::Greater,
		(SortKey::Int(Some(_)), SortKey::Int(None)) => return Ordering::Less,
		(SortKey::Int(Some(a)), SortKey::Int(Some(b))) => a.cmp(b),
		(SortKey::Float(None), SortKey::Float(None)) => Ordering::Equal,
		(SortKey::Float(None), SortKey::Float(Some(_))) => return Ordering::Greater,
		(SortKey::Float(Some(_)), SortKey::Float(None)) => return Ordering::Less,
		(SortKey::Float(Some(a)), SortKey::Float(Some(b))) => {
			a.partial_cmp(b).unwrap_or(Ordering::Equal)
		}
		(SortKey::Str(None), SortKey::Str(None)) => Ordering::Equal,
		(SortKey::Str(None), SortKey::Str(Some(_))) => return Ordering::Greater,
		(SortKey::Str(Some(_)), SortKey::Str(None)) => return Ordering::Less,
		(SortKey::Str(Some(a)), SortKey::Str(Some(b))) => {
			let dict = dict.expect("string sort keys require a dictionary");
			dict[*a].cmp(&dict[*b])
		}
		_ => Ordering::Equal,
	};
	if desc {
		ord.reverse()
	} else {
		ord
	}
}

fn run(inputs: &[RowSet], params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let input = &inputs[0];
	let by = params.int("by")?;
	let order = params.string("order")?;
	let desc = match order {
		"asc" => false,
		"desc" => true,
		other => {
			return Err(Error::Operator {
				op: "sort".into(),
				detail: format!("order must be 'asc' or 'desc', got {other}"),
			})
		}
	};
	let batch = input.batch();

	let dict = if by != BY_INTRINSIC_ID {
		match batch.column(by as u32) {
			Some(Column::StringDict(c)) => Some(c.dict.as_slice()),
			_ => None,
		}
	} else {
		None
	};

	let mut rows: Vec<(usize, SortKey)> = input
		.to_vector()
		.into_iter()
		.map(|idx| key_for(batch, by, idx).map(|k| (idx, k)))
		.collect::<Result<_>>()?;

	// Nulls-last regardless of direction still needs the DESC reversal to
	// apply only to the non-null comparison, not to the null placement —
	// `compare_keys` special-cases null ordering before honoring `desc`.
	rows.sort_by(|(_, a), (_, b)| compare_keys(a, b, desc, dict));

	Ok(input.with_ordered_selection(rows.into_iter().map(|(idx, _)| idx).collect()))
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "sort",
		params_schema: vec![
			ParamSchemaEntry {
				name: "by",
				ty: ParamType::Int,
				required: true,
				nullable: false,
				default_value: None,
			},
			ParamSchemaEntry {
				name: "order",
				ty: ParamType::String,
				required: true,
				nullable: false,
				default_value: None,
			},
		],
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 1000,
		output_pattern: OutputPattern::PermutationOfInput,
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
	use crate::batch::{FloatColumn, RowBatch};
	use crate::plan::ParamValue;
	use roaring::RoaringBitmap;
	use std::collections::HashMap;
	use std::sync::Arc;

	#[test]
	fn nulls_sort_last_regardless_of_direction() {
		let mut b = RowBatch::builder(3);
		b.push_id(1);
		b.push_id(2);
		b.push_id(3);
		let mut valid = RoaringBitmap::new();
		valid.insert(0);
		valid.insert(2);
		let batch = Arc::new(b.build().with_column(
			5,
			Column::Float(FloatColumn {
				values: vec![1.0, 0.0, 2.0],
				valid,
			}),
		));
		let input = RowSet::full(batch);

		let mut values = HashMap::new();
		values.insert("by".to_string(), ParamValue::Int(5));
		values.insert("order".to_string(), ParamValue::String("desc".to_string()));
		let params = ValidatedParams::new(values);
		let ctx = ExecCtx::new(HashMap::new(), 120);

		let out = run(&[input], &params, &ctx).unwrap();
		// row 1 (idx=1) is null and must land last even though order=desc.
		assert_eq!(out.to_vector(), vec![2, 0, 1]);
	}
}
