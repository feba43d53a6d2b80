//! The async DAG scheduler (§4.H): a cooperative event-loop model built on
//! top of a multi-threaded tokio runtime. One task is spawned per plan node;
//! each task blocks on a shared `Notify` until its declared inputs have all
//! completed, then dispatches its operator down the I/O path (`run_async`,
//! awaited directly) or the CPU-offload path (`run`, raced against the
//! node's effective budget on the bounded worker pool). All cross-task
//! bookkeeping — completed outputs, per-node status, the first failure —
//! lives behind a handful of `tokio::sync::Mutex`es, so the only place
//! scheduler state is ever mutated is inside those lock guards: the
//! practical equivalent of "touched only on the event-loop thread."

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{debug, instrument, warn};
use trice::Instant;

use crate::cnf;
use crate::ctx::{Canceller, Cancellation, ExecCtx, ExecCtxAsync};
use crate::err::{Error, Result};
use crate::plan::{Plan, PlanNode};
use crate::registry::operator::OperatorRegistry;
use crate::rowset::RowSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeStatus {
	Pending,
	Ready,
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

#[derive(Clone, Debug)]
pub struct NodeTrace {
	pub duration_ms: u64,
	pub status: NodeStatus,
}

struct Shared {
	completed: Mutex<HashMap<String, RowSet>>,
	status: Mutex<HashMap<String, NodeStatus>>,
	trace: Mutex<HashMap<String, NodeTrace>>,
	failure: Mutex<Option<Error>>,
	notify: Notify,
	canceller: Canceller,
	cancellation: Cancellation,
	semaphore: Arc<Semaphore>,
}

impl Shared {
	async fn mark_status(&self, node_id: &str, status: NodeStatus) {
		self.status.lock().await.insert(node_id.to_string(), status);
	}

	async fn record_failure_and_cancel(&self, err: Error) {
		let mut failure = self.failure.lock().await;
		if failure.is_none() {
			warn!(error = %err, "node failed, cancelling remaining nodes");
			*failure = Some(err);
		}
		drop(failure);
		self.canceller.cancel();
		self.notify.notify_waiters();
	}
}

pub struct Scheduler<'a> {
	plan: &'a Plan,
	operators: &'a OperatorRegistry,
}

impl<'a> Scheduler<'a> {
	pub fn new(plan: &'a Plan, operators: &'a OperatorRegistry) -> Self {
		Self {
			plan,
			operators,
		}
	}

	/// Executes every node of the plan and returns the sink node's `RowSet`
	/// plus a per-node trace (only meaningful for nodes whose `trace` flag
	/// was set in the plan).
	#[instrument(skip_all, fields(plan = %self.plan.plan_name))]
	pub async fn execute(&self, exec_ctx: ExecCtx) -> Result<(RowSet, HashMap<String, NodeTrace>)> {
		let (canceller, cancellation) = Canceller::new();
		let status = self
			.plan
			.nodes
			.iter()
			.map(|n| (n.node_id.clone(), NodeStatus::Pending))
			.collect();

		let shared = Arc::new(Shared {
			completed: Mutex::new(HashMap::new()),
			status: Mutex::new(status),
			trace: Mutex::new(HashMap::new()),
			failure: Mutex::new(None),
			notify: Notify::new(),
			canceller,
			cancellation,
			semaphore: Arc::new(Semaphore::new(*cnf::WORKER_POOL_SIZE)),
		});

		let mut set = tokio::task::JoinSet::new();
		for node in &self.plan.nodes {
			let shared = Arc::clone(&shared);
			let node = node.clone();
			let operators = self.operators.clone();
			let exec_ctx = exec_ctx.clone();
			set.spawn(async move { run_node(shared, node, operators, exec_ctx).await });
		}

		while let Some(joined) = set.join_next().await {
			if let Err(join_err) = joined {
				shared.record_failure_and_cancel(Error::Internal(format!("node task panicked: {join_err}"))).await;
			}
		}

		if let Some(err) = shared.failure.lock().await.take() {
			return Err(err);
		}

		let sink_id = self.plan.sink_node_id.clone();
		let sink = {
			let completed = shared.completed.lock().await;
			completed
				.get(&sink_id)
				.cloned()
				.ok_or_else(|| Error::Internal("sink node did not produce output".into()))?
		};
		let trace = shared.trace.lock().await.clone();
		Ok((sink, trace))
	}
}

async fn run_node(shared: Arc<Shared>, node: PlanNode, operators: OperatorRegistry, exec_ctx: ExecCtx) {
	loop {
		if shared.cancellation.is_cancelled() {
			shared.mark_status(&node.node_id, NodeStatus::Cancelled).await;
			return;
		}
		let ready = {
			let completed = shared.completed.lock().await;
			node.inputs.iter().all(|i| completed.contains_key(i))
		};
		if ready {
			break;
		}
		shared.notify.notified().await;
	}

	if shared.cancellation.is_cancelled() {
		shared.mark_status(&node.node_id, NodeStatus::Cancelled).await;
		return;
	}

	shared.mark_status(&node.node_id, NodeStatus::Ready).await;
	shared.mark_status(&node.node_id, NodeStatus::Running).await;
	debug!(node = %node.node_id, op = %node.op, "node running");

	let spec = match operators.find(&node.op) {
		Some(s) => s,
		None => {
			shared.record_failure_and_cancel(Error::Internal(format!("operator {} vanished after validation", node.op))).await;
			shared.mark_status(&node.node_id, NodeStatus::Failed).await;
			return;
		}
	};

	let inputs: Vec<RowSet> = {
		let completed = shared.completed.lock().await;
		node.inputs.iter().map(|i| completed[i].clone()).collect()
	};

	let budget = Duration::from_millis(node.budget_ms);
	let started = Instant::now();

	let result: Result<RowSet> = if let Some(run_async) = spec.run_async {
		let deadline = Instant::now() + budget;
		let async_ctx = ExecCtxAsync::new(exec_ctx.clone(), shared.cancellation.clone(), Some(deadline));
		let fut = run_async(&inputs, &node.validated_params, &async_ctx);
		match tokio::time::timeout(budget, fut).await {
			Ok(res) => res,
			Err(_) => Err(Error::DeadlineExceeded {
				node: node.node_id.clone(),
				budget_ms: node.budget_ms,
			}),
		}
	} else {
		offload_cpu_with_timeout(spec.run, &inputs, &node.validated_params, &exec_ctx, &shared, budget, &node.node_id).await
	};

	let elapsed_ms = started.elapsed().whole_milliseconds().max(0) as u64;

	match result {
		Ok(rowset) => {
			shared.trace.lock().await.insert(
				node.node_id.clone(),
				NodeTrace {
					duration_ms: elapsed_ms,
					status: NodeStatus::Succeeded,
				},
			);
			shared.completed.lock().await.insert(node.node_id.clone(), rowset);
			shared.mark_status(&node.node_id, NodeStatus::Succeeded).await;
			shared.notify.notify_waiters();
		}
		Err(err) => {
			shared.trace.lock().await.insert(
				node.node_id.clone(),
				NodeTrace {
					duration_ms: elapsed_ms,
					status: NodeStatus::Failed,
				},
			);
			shared.mark_status(&node.node_id, NodeStatus::Failed).await;
			shared.record_failure_and_cancel(err).await;
		}
	}
}

/// Runs a synchronous operator's `run` on the bounded blocking worker pool,
/// racing it against the node's effective budget. The worker hands its
/// result back over a one-shot `async-channel` rather than being awaited
/// directly via its `JoinHandle`: on timeout we simply stop listening and
/// drop our end of the channel, which is what "detaches the worker" means
/// in practice — the blocking thread runs to completion on its own and its
/// send against a closed channel is silently dropped.
async fn offload_cpu_with_timeout(
	run: crate::registry::operator::SyncRun,
	inputs: &[RowSet],
	params: &crate::plan::ValidatedParams,
	exec_ctx: &ExecCtx,
	shared: &Arc<Shared>,
	budget: Duration,
	node_id: &str,
) -> Result<RowSet> {
	let permit = Arc::clone(&shared.semaphore)
		.acquire_owned()
		.await
		.expect("worker pool semaphore is never closed");

	let inputs = inputs.to_vec();
	let params = params.clone();
	let exec_ctx = exec_ctx.clone();

	let (tx, rx) = channel::bounded(1);
	tokio::task::spawn_blocking(move || {
		let _permit = permit;
		let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| run(&inputs, &params, &exec_ctx)));
		let _ = tx.try_send(outcome);
	});

	match tokio::time::timeout(budget, rx.recv()).await {
		Ok(Ok(Ok(res))) => res,
		Ok(Ok(Err(panic))) => Err(Error::Internal(format!("operator task panicked: {}", describe_panic(&panic)))),
		Ok(Err(_)) => Err(Error::Internal("offload worker channel closed without a result".into())),
		Err(_) => Err(Error::DeadlineExceeded {
			node: node_id.to_string(),
			budget_ms: budget.as_millis() as u64,
		}),
	}
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"non-string panic payload".to_string()
	}
}
