//! Walks the sink node's ordered `RowSet` and turns it into the ordered
//! candidate list the engine hands back to its caller. Mirrors the
//! "stable field order" posture the wider response-shaping conventions of
//! the teacher codebase apply to their own top-level response envelope.

use serde::Serialize;

use crate::err::Result;
use crate::registry::Registries;
use crate::rowset::RowSet;
use crate::value::Value;

/// One ranked candidate. `fields` is empty unless the plan's sink node
/// carried a `project` list naming keys to include; a key absent on a given
/// row is simply omitted rather than erroring (§4.I).
#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
	pub id: i64,
	pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Materializes the sink `RowSet`'s ordered selection into a candidate list.
/// Never reorders: the assembler is a pure walk over
/// `materialize_index_view_for_output`.
pub fn assemble(
	sink: &RowSet,
	project: Option<&[String]>,
	registries: &Registries,
) -> Result<Vec<Candidate>> {
	let batch = sink.batch();
	let project_ids: Vec<(String, u32)> = match project {
		Some(names) => names
			.iter()
			.map(|name| registries.key_by_name(name).map(|k| (name.clone(), k.id)))
			.collect::<Result<_>>()?,
		None => Vec::new(),
	};

	let mut out = Vec::with_capacity(sink.len());
	for idx in sink.materialize_index_view_for_output() {
		let id = batch.get_id(idx)?;
		let mut fields = serde_json::Map::new();
		for (name, key_id) in &project_ids {
			if let Some(value) = batch.value_cell(*key_id, idx)? {
				fields.insert(name.clone(), value_to_json(value));
			}
		}
		out.push(Candidate {
			id,
			fields,
		});
	}
	Ok(out)
}

fn value_to_json(value: Value) -> serde_json::Value {
	match value {
		Value::Int(v) => serde_json::Value::from(v),
		Value::Float(v) => serde_json::Value::from(v),
		Value::String(v) => serde_json::Value::from(v),
		Value::Bool(v) => serde_json::Value::from(v),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::batch::{Column, FloatColumn, RowBatch};
	use crate::registry::{KeyEntry, KeyStatus, KeyType};
	use roaring::RoaringBitmap;
	use std::sync::Arc;

	fn registries_with_score() -> Registries {
		Registries::from_tables(
			vec![KeyEntry {
				id: 3,
				name: "final_score".into(),
				ty: KeyType::Float,
				allow_read: true,
				allow_write: true,
				status: KeyStatus::Active,
			}],
			vec![],
			vec![],
		)
	}

	#[test]
	fn assembles_ids_in_order_without_projection() {
		let mut b = RowBatch::builder(3);
		b.push_id(10);
		b.push_id(20);
		b.push_id(30);
		let batch = Arc::new(b.build());
		let sink = RowSet::full(batch).with_ordered_selection(vec![2, 0]);
		let registries = registries_with_score();

		let out = assemble(&sink, None, &registries).unwrap();
		assert_eq!(out.iter().map(|c| c.id).collect::<Vec<_>>(), vec![30, 10]);
		assert!(out[0].fields.is_empty());
	}

	#[test]
	fn projects_requested_fields_and_omits_missing() {
		let mut b = RowBatch::builder(2);
		b.push_id(1);
		b.push_id(2);
		let mut valid = RoaringBitmap::new();
		valid.insert(0);
		let batch = Arc::new(
			b.build().with_column(
				3,
				Column::Float(FloatColumn {
					values: vec![0.5, 0.0],
					valid,
				}),
			),
		);
		let sink = RowSet::full(batch);
		let registries = registries_with_score();

		let out = assemble(&sink, Some(&["final_score".to_string()]), &registries).unwrap();
		assert_eq!(out[0].fields.get("final_score").unwrap(), &serde_json::json!(0.5));
		assert!(out[1].fields.is_empty());
	}
}
