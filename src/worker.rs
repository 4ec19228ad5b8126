//! Child-process side of the process-pool strategy.
//!
//! A worker process reads newline-framed JSON [`Task`]s from stdin, resolves
//! each operation against the registry it rebuilt locally, and writes one
//! [`WireOutcome`] frame per task to stdout. On stdin EOF it exits cleanly.
//!
//! Host binaries opt in by checking [`is_worker`] early in `main` and calling
//! [`run_worker`] with their registry. The registry must be rebuilt from
//! registration code inside the child — function pointers never cross the
//! process boundary, only operation ids do.

use crate::error::TaskError;
use crate::registry::{self, OperationRegistry};
use crate::task::Task;
use crate::value::Value;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// Environment marker set by the pool when spawning workers.
pub const WORKER_ENV: &str = "BATCHLINE_WORKER";

/// Whether this process was spawned as a pool worker.
pub fn is_worker() -> bool {
    std::env::var_os(WORKER_ENV).is_some()
}

/// One response frame: the task's index plus its success value or failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireOutcome {
    pub index: u32,
    pub result: Result<Value, TaskError>,
}

/// Serve task frames until stdin closes.
///
/// Input lines that do not parse as a [`Task`] are ignored so the loop
/// tolerates harness chatter on the channel. Every parsed task gets exactly
/// one response frame, with operation errors and panics captured per task.
pub fn run_worker(registry: &OperationRegistry) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("read task frame")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(task) = serde_json::from_str::<Task>(trimmed) else {
            continue;
        };

        let result = match registry.resolve(&task.op) {
            Ok(op) => registry::invoke(op.as_ref(), &task.args),
            Err(err) => Err(err),
        };

        let frame = WireOutcome { index: task.index, result };
        let encoded = serde_json::to_string(&frame).context("encode outcome frame")?;
        stdout
            .write_all(encoded.as_bytes())
            .and_then(|()| stdout.write_all(b"\n"))
            .and_then(|()| stdout.flush())
            .context("write outcome frame")?;
    }
    Ok(())
}
