//! `rankcore-engine`: the CLI surface over the execution engine. Reads a
//! request from stdin (or `--request <path>`), executes the referenced plan
//! (or `--plan <path>`) against the built-in bring-up seed data, and writes
//! a JSON response to stdout. Library code (everything under `src/` other
//! than this binary) never initializes a tracing subscriber or chooses an
//! exit code — `main` is the single place that happens, by matching on the
//! `Result` `run` returns.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rankcore::cnf;
use rankcore::ctx::ExecCtx;
use rankcore::dbs::{assemble, Candidate, Scheduler};
use rankcore::err::{Error, Result};
use rankcore::ops;
use rankcore::plan::loader;
use rankcore::registry::{KeyStatus, Registries};
use rankcore::value::Value;

#[derive(Parser, Debug)]
#[command(name = "rankcore-engine", about = "Executes a validated ranking plan against a seed row batch")]
struct Cli {
	/// Plan JSON to execute. Omitted with no `plan` field in the request
	/// either → the engine emits a synthetic bring-up response.
	#[arg(long)]
	plan: Option<PathBuf>,

	/// Emit registry digests and counts as JSON and exit.
	#[arg(long)]
	print_registry: bool,

	/// Directory holding `keys.toml`, `params.toml`, `features.toml`.
	/// Defaults to the built-in bring-up registry.
	#[arg(long)]
	registry_dir: Option<PathBuf>,

	/// Read the request JSON from a file instead of stdin.
	#[arg(long)]
	request: Option<PathBuf>,

	/// Raise log verbosity; repeatable. Absent, `RUST_LOG` is honored as-is.
	#[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
	verbose: u8,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Request {
	request_id: Option<String>,
	plan: Option<String>,
	#[serde(default)]
	overrides: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Response {
	request_id: Option<String>,
	engine_request_id: String,
	candidates: Vec<Candidate>,
	#[serde(skip_serializing_if = "Option::is_none")]
	trace: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ParseErrorResponse<'a> {
	error: &'a str,
	detail: String,
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		// A malformed request gets its own `{error, detail}` envelope on
		// stdout rather than the generic stderr message below (§6) — this
		// is the one place that distinction is made, so `run`/`read_request`
		// stay plain `Result`-returning functions throughout.
		Err(Error::RequestParse(detail)) => {
			let envelope = ParseErrorResponse {
				error: "request parse error",
				detail,
			};
			println!("{}", serde_json::to_string(&envelope).expect("error envelope is always representable as JSON"));
			ExitCode::FAILURE
		}
		Err(err) => {
			eprintln!("rankcore-engine: {err}");
			ExitCode::FAILURE
		}
	}
}

fn init_tracing(verbose: u8) {
	let default_directive = match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<()> {
	let registries = match &cli.registry_dir {
		Some(dir) => Registries::from_dir(dir)?,
		None => Registries::builtin(),
	};

	if cli.print_registry {
		print_registry(&registries);
		return Ok(());
	}

	let request = read_request(cli.request.as_deref())?;

	let plan_path = cli.plan.clone().or_else(|| request.plan.clone().map(PathBuf::from));
	let Some(plan_path) = plan_path else {
		print_response(&synthetic_response(request.request_id))?;
		return Ok(());
	};

	let plan_text = std::fs::read_to_string(&plan_path)?;
	let operators = ops::build_registry();
	let plan = loader::load_and_validate(&plan_text, &registries, &operators)?;

	let exec_ctx = build_exec_ctx(&registries, &request.overrides)?;

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.worker_threads(*cnf::WORKER_POOL_SIZE)
		.enable_time()
		.build()
		.map_err(|e| Error::Internal(format!("failed to start tokio runtime: {e}")))?;

	let (sink, node_traces) = runtime.block_on(async {
		let scheduler = Scheduler::new(&plan, &operators);
		scheduler.execute(exec_ctx).await
	})?;

	let project = plan.sink().project.clone();
	let candidates = assemble(&sink, project.as_deref(), &registries)?;

	let trace = build_trace(&plan, &node_traces);
	info!(candidate_count = candidates.len(), "plan executed");

	print_response(&Response {
		request_id: request.request_id,
		engine_request_id: uuid::Uuid::new_v4().to_string(),
		candidates,
		trace,
	})?;
	Ok(())
}

fn read_request(path: Option<&std::path::Path>) -> Result<Request> {
	let text = match path {
		Some(p) => std::fs::read_to_string(p)?,
		None => {
			let mut buf = String::new();
			std::io::stdin().read_to_string(&mut buf)?;
			buf
		}
	};
	if text.trim().is_empty() {
		return Ok(Request::default());
	}
	serde_json::from_str(&text).map_err(|e| Error::RequestParse(e.to_string()))
}

fn synthetic_response(request_id: Option<String>) -> Response {
	Response {
		request_id,
		engine_request_id: uuid::Uuid::new_v4().to_string(),
		candidates: (1..=5)
			.map(|id| Candidate {
				id,
				fields: serde_json::Map::new(),
			})
			.collect(),
		trace: None,
	}
}

fn print_response(response: &Response) -> Result<()> {
	println!("{}", serde_json::to_string(response)?);
	Ok(())
}

/// Builds the parameter values handed to the expression evaluator via
/// `ExecCtx`: every registered parameter's default value, overridden by the
/// request's `overrides` map (keyed by parameter name, resolved to an id).
fn build_exec_ctx(registries: &Registries, overrides: &HashMap<String, serde_json::Value>) -> Result<ExecCtx> {
	let mut values = HashMap::new();
	for param in registries.params() {
		if let Some(default) = &param.default_value {
			values.insert(param.id, default.clone());
		}
	}
	for (name, raw) in overrides {
		let param = registries.param_by_name(name)?;
		let value = json_to_value(param.ty, raw)?;
		values.insert(param.id, value);
	}
	Ok(ExecCtx::new(values, *cnf::MAX_COMPUTATION_DEPTH))
}

fn json_to_value(ty: rankcore::registry::KeyType, raw: &serde_json::Value) -> Result<Value> {
	use rankcore::registry::KeyType;
	match ty {
		KeyType::Int => raw
			.as_i64()
			.map(Value::Int)
			.ok_or_else(|| Error::Internal(format!("override value {raw} is not an Int"))),
		KeyType::Float => raw
			.as_f64()
			.map(Value::Float)
			.ok_or_else(|| Error::Internal(format!("override value {raw} is not a Float"))),
		KeyType::String => raw
			.as_str()
			.map(|s| Value::String(s.to_string()))
			.ok_or_else(|| Error::Internal(format!("override value {raw} is not a String"))),
		KeyType::Bool => raw
			.as_bool()
			.map(Value::Bool)
			.ok_or_else(|| Error::Internal(format!("override value {raw} is not a Bool"))),
		KeyType::FeatureBundle => Err(Error::Internal("feature-bundle parameters are not overridable".into())),
	}
}

/// Builds a trace object covering only the nodes that asked for one; `None`
/// when the plan named none, so the response omits the field entirely.
fn build_trace(
	plan: &rankcore::plan::Plan,
	node_traces: &HashMap<String, rankcore::dbs::NodeTrace>,
) -> Option<serde_json::Value> {
	let mut out = serde_json::Map::new();
	for node in &plan.nodes {
		if !node.trace {
			continue;
		}
		if let Some(t) = node_traces.get(&node.node_id) {
			out.insert(
				node.node_id.clone(),
				serde_json::json!({
					"duration_ms": t.duration_ms,
					"status": format!("{:?}", t.status),
				}),
			);
		}
	}
	if out.is_empty() {
		None
	} else {
		Some(serde_json::Value::Object(out))
	}
}

fn print_registry(registries: &Registries) {
	let mut active = 0usize;
	let mut deprecated = 0usize;
	let mut blocked = 0usize;
	for key in registries.keys() {
		match key.status {
			KeyStatus::Active => active += 1,
			KeyStatus::Deprecated => deprecated += 1,
			KeyStatus::Blocked => blocked += 1,
		}
	}
	let digests = registries.digests();
	let out = serde_json::json!({
		"keys": {
			"digest": digests.keys,
			"count": registries.keys().count(),
			"active": active,
			"deprecated": deprecated,
			"blocked": blocked,
		},
		"params": {
			"digest": digests.params,
			"count": registries.params().count(),
		},
		"features": {
			"digest": digests.features,
			"count": registries.features().count(),
		},
	});
	println!("{out}");
}
