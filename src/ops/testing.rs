//! Test-only operators (`sleep`, `busy_cpu`) that exist solely to drive the
//! scheduler's own test suite: one exercises the async/await suspension
//! path and cooperative cancellation, the other forces the CPU-offload path
//! by declaring no `run_async` at all. Neither appears in a production plan's
//! operator vocabulary; both are gated behind the `test-ops` feature.

use std::collections::HashSet;
use std::time::{Duration, Instant as StdInstant};

use futures::future::BoxFuture;

use crate::ctx::{ExecCtx, ExecCtxAsync};
use crate::err::{Error, Result};
use crate::plan::ValidatedParams;
use crate::registry::operator::{OperatorSpec, OutputPattern, ParamSchemaEntry, ParamType};
use crate::rowset::RowSet;

fn no_reads(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

fn no_writes(_params: &ValidatedParams) -> HashSet<u32> {
	HashSet::new()
}

// -- sleep ---------------------------------------------------------------

fn sleep_run(inputs: &[RowSet], params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let duration_ms = params.int("duration_ms")?.max(0) as u64;
	std::thread::sleep(Duration::from_millis(duration_ms));
	finish_sleep(inputs, params)
}

fn sleep_run_async<'a>(
	inputs: &'a [RowSet],
	params: &'a ValidatedParams,
	ctx: &'a ExecCtxAsync,
) -> BoxFuture<'a, Result<RowSet>> {
	Box::pin(async move {
		let duration_ms = params.int("duration_ms")?.max(0) as u64;
		let cancellation = ctx.cancellation();
		tokio::select! {
			_ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {}
			_ = wait_for_cancel(cancellation) => {
				return Err(Error::Cancelled("sleep".into()));
			}
		}
		finish_sleep(inputs, params)
	})
}

async fn wait_for_cancel(cancellation: crate::ctx::Cancellation) {
	loop {
		if cancellation.is_cancelled() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}

fn finish_sleep(inputs: &[RowSet], params: &ValidatedParams) -> Result<RowSet> {
	let fail_after = matches!(params.bool("fail_after_sleep"), Ok(true));
	if fail_after {
		return Err(Error::Operator {
			op: "sleep".into(),
			detail: "fail_after_sleep was set".into(),
		});
	}
	Ok(inputs[0].clone())
}

pub fn sleep_spec() -> OperatorSpec {
	OperatorSpec {
		op: "sleep",
		params_schema: vec![
			ParamSchemaEntry {
				name: "duration_ms",
				ty: ParamType::Int,
				required: true,
				nullable: false,
				default_value: None,
			},
			ParamSchemaEntry {
				name: "fail_after_sleep",
				ty: ParamType::Bool,
				required: false,
				nullable: false,
				default_value: Some(crate::value::Value::Bool(false)),
			},
		],
		reads_fn: no_reads,
		writes_fn: no_writes,
		default_budget_ms: 30_000,
		output_pattern: OutputPattern::UnaryPreserveView,
		writes_effect: None,
		is_io: true,
		run: sleep_run,
		run_async: Some(sleep_run_async),
		min_inputs: 1,
		max_inputs: Some(1),
	}
}

// -- busy_cpu --------------------------------------------------------------

fn busy_cpu_run(inputs: &[RowSet], params: &ValidatedParams, _ctx: &ExecCtx) -> Result<RowSet> {
	let busy_wait_ms = params.int("busy_wait_ms")?.max(0) as u64;
	let deadline = StdInstant::now() + Duration::from_millis(busy_wait_ms);
	while StdInstant::now() < deadline {
		std::hint::spin_loop();
	}
	Ok(inputs[0].clone())
}

pub fn busy_cpu_spec() -> OperatorSpec {
	OperatorSpec {
		op: "busy_cpu",
		params_schema: vec![ParamSchemaEntry {
			name: "busy_wait_ms",
			ty: ParamType::Int,
			required: true,
			nullable: false,
			default_value: None,
		}],
		reads_fn: no_reads,
		writes_fn: no_writes,
		default_budget_ms: 30_000,
		output_pattern: OutputPattern::UnaryPreserveView,
		writes_effect: None,
		is_io: false,
		run: busy_cpu_run,
		run_async: None,
		min_inputs: 1,
		max_inputs: Some(1),
	}
}
