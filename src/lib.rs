//! # Batchline
//!
//! A **unified concurrent execution layer** for Rust: apply one operation to
//! many independent work items under one of three interchangeable strategies
//! — cooperative (single-threaded, suspend between dispatches), OS-thread
//! pool, and OS-process pool — behind a single call contract. On top of it
//! sits a **bulk tabular batch pipeline** that reads many delimited files
//! into in-memory tables, transforms them, and writes them back out.
//!
//! ## Key Properties
//!
//! - **One contract, three schedulers** - pick the strategy per batch, the
//!   result shape never changes
//! - **Submission order == result order** - outcomes are index-addressed;
//!   completion order is unspecified and invisible
//! - **Per-task failure isolation** - an operation that errors or panics
//!   produces one `Failure` outcome and never aborts its siblings
//! - **Crash isolation** - a process-pool worker that dies takes down only
//!   its in-flight task; the pool respawns it and keeps going
//! - **Scoped pools** - threads are joined and processes killed and reaped
//!   on every exit path, including failure
//! - **Deadlines and fail-fast** - cooperative tasks stop at suspension
//!   points, thread tasks between pickups, process workers are killed
//!
//! ## Quick Start
//!
//! ```ignore
//! use batchline::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut registry = OperationRegistry::new();
//! registry.register_fn("double", |args| {
//!     let n = value::require_int(args, "n")?;
//!     Ok(Value::Int(n * 2))
//! });
//! let registry = Arc::new(registry);
//!
//! let tasks: Vec<Task> = (0..10)
//!     .map(|i| Task::new(i, "double").with_arg("n", i as i64))
//!     .collect();
//!
//! let outcomes = submit::run(tasks, StrategyConfig::thread_pool(), registry)?;
//! assert_eq!(outcomes.len(), 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Task and Outcome
//!
//! A [`Task`] is an immutable unit of work: an operation id, keyed
//! [`Value`] arguments, and an ordinal index that fixes where its result
//! lands. Every submitted task yields exactly one [`Outcome`] — a success
//! value, a per-task failure, or an explicit skip marker when fail-fast
//! stopped the batch first.
//!
//! ### Strategies
//!
//! [`StrategyConfig`] selects the concurrency model for a batch:
//!
//! - `Cooperative` - one thread, tasks interleave at suspension points
//!   between dispatches, where deadlines are also observed. CPU-bound
//!   operations starve siblings; use it for I/O-dominant work.
//! - `ThreadPool` - a dedicated fixed-size rayon pool. Shared memory,
//!   per-slot write discipline, no preemption.
//! - `ProcessPool` - OS child processes serving tasks over serialized
//!   frames. Private memory, crash isolation, kill-on-deadline.
//!
//! ### Registry
//!
//! Operations are registered by name in an [`OperationRegistry`]; batches
//! refer to them by id only. That indirection is what makes the process
//! pool work: a worker process rebuilds the registry from the same
//! registration code and re-resolves ids on its side of the boundary.
//!
//! ### Batch pipeline
//!
//! [`BatchJob`] turns a list of source files into read, transform, and
//! write stages, one task per file per stage, with per-file failure
//! isolation and an explicit state machine. See [`batch`].
//!
//! ```ignore
//! use batchline::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut registry = OperationRegistry::new();
//! batch::register_table_ops(&mut registry);
//! registry.register(
//!     "dedup_headers",
//!     batch::table_operation(|t| Ok(t)),
//! );
//!
//! let report = BatchJob::new(StrategyConfig::thread_pool())
//!     .source_glob("data/*.csv")?
//!     .transform("dedup_headers")
//!     .output_dir("out")
//!     .run(&Arc::new(registry))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`task`] - `Task`, `Outcome`, `OperationId`
//! - [`value`] - the closed `Value` union and argument helpers
//! - [`registry`] - named operations and resolution
//! - [`collector`] - index-addressed result slots
//! - [`strategy`] - the three execution strategies and their shared config
//! - [`pool`] - scoped acquisition and teardown of pool workers
//! - [`worker`] - the child-process worker loop
//! - [`submit`] - the caller-facing submission API
//! - [`table`] / [`io`] - the tabular reader/writer collaborator
//! - [`batch`] - the file pipeline built on all of the above

pub mod batch;
pub mod collector;
pub mod error;
pub mod io;
pub mod pool;
pub mod registry;
pub mod strategy;
pub mod submit;
pub mod table;
pub mod task;
pub mod value;
pub mod worker;

// General re-exports
pub use batch::{BatchJob, BatchReport, BatchState, SourceStatus};
pub use collector::ResultCollector;
pub use error::{BatchError, TaskError};
pub use pool::WorkerCommand;
pub use registry::{Operation, OperationRegistry};
pub use strategy::{CancelReason, StrategyConfig, StrategyKind};
pub use submit::BatchHandle;
pub use table::{Column, Table};
pub use task::{OperationId, Outcome, Status, Task};
pub use value::{ArgMap, Value};
