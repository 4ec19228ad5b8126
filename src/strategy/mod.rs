//! Interchangeable execution strategies behind one call contract.
//!
//! Three scheduling models coexist here: single-threaded cooperative
//! ([`cooperative`]), OS-thread parallel ([`threads`]), and OS-process
//! parallel ([`process`]). The caller picks one per batch via
//! [`StrategyConfig`]; all three run every task, route each outcome into the
//! shared [`ResultCollector`](crate::collector::ResultCollector), and hand
//! back a full, index-ordered result list.
//!
//! Ordering: submission order always determines result order via index
//! addressing. Completion order is unspecified and must never be assumed.

pub mod cooperative;
pub mod process;
pub mod threads;

use crate::collector::ResultCollector;
use crate::error::BatchError;
use crate::pool::WorkerCommand;
use crate::registry::{Operation, OperationRegistry};
use crate::task::{Outcome, Task};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// The three concurrency models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Single thread, cooperative suspension between task dispatches.
    /// CPU-bound operations starve siblings; intended for I/O-dominant work.
    Cooperative,
    /// Fixed-size pool of OS threads sharing memory by reference.
    ThreadPool,
    /// Fixed-size pool of OS processes with private memory and crash
    /// isolation.
    ProcessPool,
}

/// Per-batch execution settings.
#[derive(Clone, Debug)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Worker count; `0` picks the strategy default (a bounded fraction of
    /// hardware concurrency).
    pub concurrency: usize,
    /// Cancel the remainder of the batch on the first failure. Unattempted
    /// indices are marked `Skipped`, never silently absent.
    pub fail_fast: bool,
    /// Batch deadline, checked at dispatch and at suspension points or
    /// between task pickups.
    pub timeout: Option<Duration>,
    /// Process pool only: how to launch workers. Defaults to re-executing
    /// the current binary.
    pub worker: Option<WorkerCommand>,
}

impl StrategyConfig {
    pub fn new(kind: StrategyKind) -> Self {
        Self { kind, concurrency: 0, fail_fast: false, timeout: None, worker: None }
    }

    pub fn cooperative() -> Self {
        Self::new(StrategyKind::Cooperative)
    }

    pub fn thread_pool() -> Self {
        Self::new(StrategyKind::ThreadPool)
    }

    pub fn process_pool() -> Self {
        Self::new(StrategyKind::ProcessPool)
    }

    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_worker(mut self, worker: WorkerCommand) -> Self {
        self.worker = Some(worker);
        self
    }
}

/// Why a batch stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The configured deadline passed.
    Deadline,
    /// Fail-fast tripped on the first failure.
    FailFast,
    /// The caller cancelled through the batch handle.
    Caller,
}

/// Shared cancellation state, checked at every suspension point and between
/// task pickups. Cloning shares the same token.
#[derive(Clone, Debug)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    flag: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                flag: AtomicBool::new(false),
                reason: Mutex::new(None),
                deadline: timeout.map(|t| Instant::now() + t),
            }),
        }
    }

    /// Request cancellation. The first recorded reason wins.
    pub fn cancel(&self, reason: CancelReason) {
        let mut slot = self.inner.reason.lock().unwrap();
        if slot.is_none() {
            *slot = Some(reason);
        }
        self.inner.flag.store(true, Ordering::SeqCst);
    }

    /// The active cancellation reason, if any. A passed deadline counts as
    /// cancellation even before anyone observed it.
    pub fn cancelled(&self) -> Option<CancelReason> {
        if self.inner.flag.load(Ordering::SeqCst) {
            return *self.inner.reason.lock().unwrap();
        }
        if let Some(deadline) = self.inner.deadline
            && Instant::now() >= deadline
        {
            self.cancel(CancelReason::Deadline);
            return Some(CancelReason::Deadline);
        }
        None
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// The outcome for a task that never ran: a timeout is a per-task failure,
/// everything else is an explicit skip marker.
pub(crate) fn not_attempted(index: u32, reason: CancelReason) -> Outcome {
    match reason {
        CancelReason::Deadline => Outcome::failure(index, crate::error::TaskError::TimeoutExceeded),
        CancelReason::FailFast | CancelReason::Caller => Outcome::skipped(index),
    }
}

/// Check the whole batch before any dispatch: every operation must resolve
/// and every index must map to exactly one slot. An invalid batch is
/// rejected with no task started.
pub(crate) fn validate(
    tasks: &[Task],
    registry: &OperationRegistry,
) -> Result<Vec<Arc<dyn Operation>>, BatchError> {
    let len = tasks.len();
    let mut seen = vec![false; len];
    let mut ops = Vec::with_capacity(len);
    for task in tasks {
        let slot = task.index as usize;
        if slot >= len {
            return Err(BatchError::IndexOutOfRange { index: task.index, len });
        }
        if seen[slot] {
            return Err(BatchError::DuplicateIndex(task.index));
        }
        seen[slot] = true;
        let op = registry
            .resolve(&task.op)
            .map_err(|_| BatchError::UnknownOperation(task.op.to_string()))?;
        ops.push(op);
    }
    Ok(ops)
}

/// Run a batch under the configured strategy and drain the collector in
/// index order. `ops` are the operations [`validate`] resolved for the
/// tasks, position for position.
pub(crate) fn run_batch(
    tasks: Vec<Task>,
    ops: Vec<Arc<dyn Operation>>,
    config: &StrategyConfig,
    cancel: &CancelToken,
) -> Result<Vec<Outcome>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let collector = Arc::new(ResultCollector::new(tasks.len()));

    match config.kind {
        StrategyKind::Cooperative => {
            cooperative::run(tasks, ops, Arc::clone(&collector), cancel.clone(), config)?
        }
        StrategyKind::ThreadPool => {
            threads::run(tasks, ops, Arc::clone(&collector), cancel.clone(), config)?
        }
        StrategyKind::ProcessPool => {
            process::run(tasks, Arc::clone(&collector), cancel.clone(), config)?
        }
    }

    if let Some(reason) = cancel.cancelled() {
        collector.finish_vacant(|i| not_attempted(i, reason));
    }
    Ok(collector.drain()?)
}
