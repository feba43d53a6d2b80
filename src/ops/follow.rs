//! `source.follow`: the only operator with zero inputs. Fetches a seed batch
//! from a backing endpoint. The concrete data-source fetcher is an external
//! collaborator outside this engine's scope; this implementation produces a
//! deterministic synthetic batch instead, which is what the engine's own
//! bring-up/test fixtures (and the CLI's no-plan synthetic response) need.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use roaring::RoaringBitmap;

use crate::batch::{Column, RowBatch, StringDictColumn};
use crate::ctx::{ExecCtx, ExecCtxAsync};
use crate::err::Result;
use crate::plan::ValidatedParams;
use crate::registry::operator::{OutputPattern, ParamSchemaEntry, ParamType, OperatorSpec};
use crate::rowset::RowSet;

fn reads(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn writes(params: &ValidatedParams) -> HashSet<u32> {
	let mut out = HashSet::new();
	if let Ok(key) = params.int("country_key") {
		out.insert(key as u32);
	}
	out
}

fn build_batch(params: &ValidatedParams) -> Result<RowBatch> {
	let fanout = params.int("fanout")?.max(0) as usize;
	let mut builder = RowBatch::builder(fanout);
	for id in 1..=fanout as i64 {
		builder.push_id(id);
	}
	let mut batch = builder.build();

	if let Ok(country_key) = params.int("country_key") {
		let dict = Arc::new(vec!["US".to_string(), "OTHER".to_string()]);
		let mut valid = RoaringBitmap::new();
		let codes: Vec<u32> = (1..=fanout as i64)
			.enumerate()
			.map(|(idx, id)| {
				valid.insert(idx as u32);
				if id % 2 == 1 {
					0
				} else {
					1
				}
			})
			.collect();
		batch = batch.with_column(
			country_key as u32,
			Column::StringDict(StringDictColumn {
				codes,
				valid,
				dict,
			}),
		);
	}

	Ok(batch)
}

fn run(_inputs: &[RowSet], params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let batch = build_batch(params)?;
	Ok(RowSet::full(Arc::new(batch)))
}

fn run_async<'a>(
	inputs: &'a [RowSet],
	params: &'a ValidatedParams,
	ctx: &'a ExecCtxAsync,
) -> BoxFuture<'a, Result<RowSet>> {
	Box::pin(async move { run(inputs, params, ctx.sync()) })
}

pub fn spec() -> OperatorSpec {
	OperatorSpec {
		op: "source.follow",
		params_schema: vec![
			ParamSchemaEntry {
				name: "fanout",
				ty: ParamType::Int,
				required: true,
				nullable: false,
				default_value: None,
			},
			ParamSchemaEntry {
				name: "country_key",
				ty: ParamType::Int,
				required: false,
				nullable: true,
				default_value: None,
			},
		],
		reads_fn: reads,
		writes_fn: writes,
		default_budget_ms: 2000,
		output_pattern: OutputPattern::Source,
		writes_effect: Some("writes id and, when country_key is set, a synthetic country column"),
		is_io: true,
		run,
		run_async: Some(run_async),
		min_inputs: 0,
		max_inputs: Some(0),
	}
}
