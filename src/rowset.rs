//! A non-owning view over a [`RowBatch`]: an ordered selection of active row
//! indices, plus a flag recording whether that order is semantically
//! meaningful. Operators compose by producing new `RowSet`s that share the
//! same underlying batch — the batch itself is never copied.

use std::sync::Arc;

use crate::batch::RowBatch;

#[derive(Clone, Debug)]
pub struct RowSet {
	batch: Arc<RowBatch>,
	selection: Vec<usize>,
	order_preserved: bool,
}

impl RowSet {
	/// A fresh view over a whole batch, in natural row order, with
	/// `order_preserved = true` (a source operator's output is its own
	/// declared order).
	pub fn full(batch: Arc<RowBatch>) -> Self {
		let selection = (0..batch.size()).collect();
		Self {
			batch,
			selection,
			order_preserved: true,
		}
	}

	pub fn batch(&self) -> &Arc<RowBatch> {
		&self.batch
	}

	pub fn active_rows(&self) -> impl Iterator<Item = usize> + '_ {
		self.selection.iter().copied()
	}

	pub fn len(&self) -> usize {
		self.selection.len()
	}

	pub fn is_empty(&self) -> bool {
		self.selection.is_empty()
	}

	pub fn order_preserved(&self) -> bool {
		self.order_preserved
	}

	/// A new view sharing this batch, with a new selection and order marked
	/// as not semantically meaningful (used by unordered filters/sources).
	pub fn with_selection_clear_order(&self, new_selection: Vec<usize>) -> Self {
		Self {
			batch: Arc::clone(&self.batch),
			selection: new_selection,
			order_preserved: false,
		}
	}

	/// A new view over a different (but row-count-compatible) batch, keeping
	/// this view's selection and order flag unchanged. Used by `vm`, which
	/// derives a new batch (existing columns plus one new one) but must not
	/// otherwise disturb the view it was handed.
	pub fn with_batch_same_selection(&self, new_batch: Arc<RowBatch>) -> Self {
		Self {
			batch: new_batch,
			selection: self.selection.clone(),
			order_preserved: self.order_preserved,
		}
	}

	/// A new view sharing this batch, with a new selection whose order is
	/// semantically meaningful (stable filter/sort/take/merge output).
	pub fn with_ordered_selection(&self, new_selection: Vec<usize>) -> Self {
		Self {
			batch: Arc::clone(&self.batch),
			selection: new_selection,
			order_preserved: true,
		}
	}

	/// Reifies the selection as a dense vector in its current order. If the
	/// order is not preserved, the natural (ascending row-index) order is
	/// used, matching `toVector`'s documented fallback.
	pub fn to_vector(&self) -> Vec<usize> {
		if self.order_preserved {
			self.selection.clone()
		} else {
			let mut v = self.selection.clone();
			v.sort_unstable();
			v
		}
	}

	/// The ordered sequence of row indices to hand to the result assembler.
	pub fn materialize_index_view_for_output(&self) -> Vec<usize> {
		self.to_vector()
	}
}
