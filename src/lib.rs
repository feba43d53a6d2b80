//! `rankcore`: the execution engine for a ranking pipeline. A validated plan
//! artifact describes a DAG of columnar operators; this crate loads that
//! plan, schedules it against a seed row batch, and assembles the sink
//! node's ordered output into a response.
//!
//! The plan authoring surface, plan compilation, and the concrete
//! data-source fetchers behind operators like `source.follow` are external
//! collaborators — this crate only sees their outputs (a compiled plan
//! artifact, a seed `RowBatch`) and interfaces (the operator `run`/
//! `run_async` contract).

pub mod batch;
pub mod cnf;
pub mod ctx;
pub mod dbs;
pub mod digest;
pub mod err;
pub(crate) mod mac;
pub mod ops;
pub mod plan;
pub mod pred;
pub mod expr;
pub mod registry;
pub mod rowset;
pub mod value;

pub use err::{Error, Result};
