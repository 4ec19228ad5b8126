//! Caller-facing submission API.
//!
//! [`submit`] validates the batch, then hands orchestration to a background
//! thread and returns a [`BatchHandle`] immediately: the caller thread stays
//! free to wait, cancel, or enforce its own timeout. [`run`] is the
//! submit-and-wait convenience used by the batch pipeline.

use crate::registry::OperationRegistry;
use crate::strategy::{self, CancelReason, CancelToken, StrategyConfig};
use crate::task::{Outcome, Task};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// A running batch. Dropping the handle without waiting does not stop the
/// batch; use [`BatchHandle::cancel`] for that.
#[derive(Debug)]
pub struct BatchHandle {
    rx: Receiver<Result<Vec<Outcome>>>,
    cancel: CancelToken,
}

impl BatchHandle {
    /// Block until the batch finishes and return one outcome per submitted
    /// task, in submission order.
    pub fn wait(self) -> Result<Vec<Outcome>> {
        self.rx
            .recv()
            .context("batch orchestrator exited without reporting")?
    }

    /// Request cancellation: tasks not yet started are skipped, in-flight
    /// tasks stop at their strategy's next opportunity.
    pub fn cancel(&self) {
        self.cancel.cancel(CancelReason::Caller);
    }
}

/// Validate and launch a batch under the chosen strategy.
///
/// Misconfiguration — an operation id that does not resolve, a duplicate or
/// out-of-range index — fails here, before any task is dispatched. An empty
/// batch is not an error; its handle yields an empty result list without
/// spawning a single worker.
pub fn submit(
    tasks: Vec<Task>,
    config: StrategyConfig,
    registry: Arc<OperationRegistry>,
) -> Result<BatchHandle> {
    let ops = strategy::validate(&tasks, &registry)?;

    let cancel = CancelToken::new(config.timeout);
    let (tx, rx) = mpsc::channel();
    let orchestrator_cancel = cancel.clone();
    thread::Builder::new()
        .name("batchline-orchestrator".to_string())
        .spawn(move || {
            let result = strategy::run_batch(tasks, ops, &config, &orchestrator_cancel);
            let _ = tx.send(result);
        })
        .context("spawn batch orchestrator")?;

    Ok(BatchHandle { rx, cancel })
}

/// Submit a batch and wait for every outcome.
pub fn run(
    tasks: Vec<Task>,
    config: StrategyConfig,
    registry: Arc<OperationRegistry>,
) -> Result<Vec<Outcome>> {
    submit(tasks, config, registry)?.wait()
}
