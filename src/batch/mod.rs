//! The columnar, immutable-after-construction row store. A [`RowBatch`] is
//! produced once by a source operator and then shared by reference across
//! every downstream [`crate::rowset::RowSet`] — operators that "write" a new
//! column never mutate the batch in place, they build a new batch that
//! shares the old columns and appends the new one (copy-on-write at column
//! granularity, not batch granularity).

use std::collections::HashMap;
use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::err::{Error, Result};
use crate::value::Value;

/// A column of `f64` values with a validity bitmap (set bit = valid/non-null).
#[derive(Clone, Debug)]
pub struct FloatColumn {
	pub values: Vec<f64>,
	pub valid: RoaringBitmap,
}

/// A dictionary-encoded string column: each row holds a code into a shared
/// dictionary of distinct strings.
#[derive(Clone, Debug)]
pub struct StringDictColumn {
	pub codes: Vec<u32>,
	pub valid: RoaringBitmap,
	pub dict: Arc<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct BoolColumn {
	pub values: Vec<bool>,
	pub valid: RoaringBitmap,
}

/// An opaque, fixed-layout blob per row, addressed by key id only; the engine
/// does not interpret its contents.
#[derive(Clone, Debug)]
pub struct FeatureBundleColumn {
	pub blobs: Vec<Arc<[u8]>>,
	pub valid: RoaringBitmap,
}

#[derive(Clone, Debug)]
pub enum Column {
	Float(FloatColumn),
	StringDict(StringDictColumn),
	Bool(BoolColumn),
	FeatureBundle(FeatureBundleColumn),
}

/// The row-aligned column store of fixed size `N` (`self.size`).
#[derive(Clone, Debug)]
pub struct RowBatch {
	size: usize,
	ids: Vec<i64>,
	id_valid: RoaringBitmap,
	columns: HashMap<u32, Column>,
}

impl RowBatch {
	pub fn new(ids: Vec<i64>, id_valid: RoaringBitmap) -> Self {
		let size = ids.len();
		Self {
			size,
			ids,
			id_valid,
			columns: HashMap::new(),
		}
	}

	pub fn size(&self) -> usize {
		self.size
	}

	pub fn get_id(&self, idx: usize) -> Result<i64> {
		self.ids.get(idx).copied().ok_or(Error::RowIndexOutOfBounds(idx))
	}

	pub fn is_id_valid(&self, idx: usize) -> bool {
		self.id_valid.contains(idx as u32)
	}

	pub fn has_column(&self, key_id: u32) -> bool {
		self.columns.contains_key(&key_id)
	}

	pub fn column(&self, key_id: u32) -> Option<&Column> {
		self.columns.get(&key_id)
	}

	pub fn float_cell(&self, key_id: u32, idx: usize) -> Result<Option<f64>> {
		match self.columns.get(&key_id) {
			Some(Column::Float(c)) => {
				if !c.valid.contains(idx as u32) {
					Ok(None)
				} else {
					c.values.get(idx).copied().map(Some).ok_or(Error::RowIndexOutOfBounds(idx))
				}
			}
			Some(_) => Err(Error::Internal(format!("key {key_id} is not a float column"))),
			None => Err(Error::MissingColumn(key_id.to_string())),
		}
	}

	pub fn string_cell(&self, key_id: u32, idx: usize) -> Result<Option<&str>> {
		match self.columns.get(&key_id) {
			Some(Column::StringDict(c)) => {
				if !c.valid.contains(idx as u32) {
					Ok(None)
				} else {
					let code = *c.codes.get(idx).ok_or(Error::RowIndexOutOfBounds(idx))?;
					Ok(c.dict.get(code as usize).map(|s| s.as_str()))
				}
			}
			Some(_) => Err(Error::Internal(format!("key {key_id} is not a string column"))),
			None => Err(Error::MissingColumn(key_id.to_string())),
		}
	}

	pub fn bool_cell(&self, key_id: u32, idx: usize) -> Result<Option<bool>> {
		match self.columns.get(&key_id) {
			Some(Column::Bool(c)) => {
				if !c.valid.contains(idx as u32) {
					Ok(None)
				} else {
					c.values.get(idx).copied().map(Some).ok_or(Error::RowIndexOutOfBounds(idx))
				}
			}
			Some(_) => Err(Error::Internal(format!("key {key_id} is not a bool column"))),
			None => Err(Error::MissingColumn(key_id.to_string())),
		}
	}

	/// Reads a cell as a generic [`Value`], used by the expression evaluator
	/// which is agnostic to the concrete column storage. Key id `0` is the
	/// intrinsic `id` column, the same sentinel `sort`'s `by` parameter uses
	/// to mean "sort by id" rather than a registered key.
	pub fn value_cell(&self, key_id: u32, idx: usize) -> Result<Option<Value>> {
		if key_id == 0 {
			return Ok(if self.is_id_valid(idx) {
				Some(Value::Int(self.get_id(idx)?))
			} else {
				None
			});
		}
		match self.columns.get(&key_id) {
			Some(Column::Float(_)) => Ok(self.float_cell(key_id, idx)?.map(Value::Float)),
			Some(Column::StringDict(_)) => {
				Ok(self.string_cell(key_id, idx)?.map(|s| Value::String(s.to_string())))
			}
			Some(Column::Bool(_)) => Ok(self.bool_cell(key_id, idx)?.map(Value::Bool)),
			Some(Column::FeatureBundle(_)) => {
				Err(Error::Internal(format!("key {key_id} is a feature bundle, not scalar")))
			}
			None => Err(Error::MissingColumn(key_id.to_string())),
		}
	}

	/// Returns a new batch sharing `self`'s ids and all existing columns,
	/// with `column` written (or overwritten) at `key_id`. Most-recent-write
	/// wins when the key was already populated.
	pub fn with_column(&self, key_id: u32, column: Column) -> Self {
		let mut columns = self.columns.clone();
		columns.insert(key_id, column);
		Self {
			size: self.size,
			ids: self.ids.clone(),
			id_valid: self.id_valid.clone(),
			columns,
		}
	}

	pub fn builder(size: usize) -> RowBatchBuilder {
		RowBatchBuilder {
			size,
			ids: Vec::with_capacity(size),
			id_valid: RoaringBitmap::new(),
			columns: HashMap::new(),
		}
	}
}

pub struct RowBatchBuilder {
	size: usize,
	ids: Vec<i64>,
	id_valid: RoaringBitmap,
	columns: HashMap<u32, Column>,
}

impl RowBatchBuilder {
	pub fn push_id(&mut self, id: i64) -> &mut Self {
		let idx = self.ids.len() as u32;
		self.ids.push(id);
		self.id_valid.insert(idx);
		self
	}

	pub fn with_float_column(mut self, key_id: u32, column: FloatColumn) -> Self {
		self.columns.insert(key_id, Column::Float(column));
		self
	}

	pub fn with_string_column(mut self, key_id: u32, column: StringDictColumn) -> Self {
		self.columns.insert(key_id, Column::StringDict(column));
		self
	}

	pub fn with_bool_column(mut self, key_id: u32, column: BoolColumn) -> Self {
		self.columns.insert(key_id, Column::Bool(column));
		self
	}

	pub fn build(self) -> RowBatch {
		RowBatch {
			size: self.size,
			ids: self.ids,
			id_valid: self.id_valid,
			columns: self.columns,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn with_column_preserves_existing_columns() {
		let mut b = RowBatch::builder(2);
		b.push_id(10);
		b.push_id(20);
		let batch = b.build();
		let mut valid = RoaringBitmap::new();
		valid.insert(0);
		valid.insert(1);
		let with_float = batch.with_column(
			3,
			Column::Float(FloatColumn {
				values: vec![1.0, 2.0],
				valid,
			}),
		);
		assert_eq!(with_float.get_id(0).unwrap(), 10);
		assert_eq!(with_float.float_cell(3, 1).unwrap(), Some(2.0));
		assert!(batch.float_cell(3, 1).is_err());
	}
}
