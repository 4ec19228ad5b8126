//! Error taxonomy for the execution layer.
//!
//! Two tiers:
//! - [`TaskError`] is the per-task failure record carried inside an
//!   [`Outcome`](crate::task::Outcome). It is serializable so a worker
//!   process can report it over the wire, and it never aborts sibling tasks.
//! - [`BatchError`] covers batch-level misconfiguration and misuse. These
//!   abort before any task runs (or, for [`BatchError::IncompleteBatch`],
//!   flag a caller bug on drain).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of exactly one task. Recovered locally, surfaced in the result
/// list, never propagated to siblings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
pub enum TaskError {
    /// The operation id did not resolve in the registry active at run time.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// The operation itself returned an error or panicked.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// Process-pool only: the worker running this task exited abnormally.
    /// The pool self-heals by respawning the worker.
    #[error("worker process crashed: {0}")]
    WorkerCrash(String),

    /// The batch deadline was reached before this task finished.
    #[error("deadline exceeded")]
    TimeoutExceeded,
}

/// Batch-level failure: rejects a submission before any work starts, or
/// reports collector misuse.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Submission named an operation the registry cannot resolve. No task of
    /// the batch is dispatched.
    #[error("unknown operation `{0}` in submitted batch")]
    UnknownOperation(String),

    /// Two tasks claimed the same result slot.
    #[error("duplicate task index {0} in submitted batch")]
    DuplicateIndex(u32),

    /// A task's index does not fit the batch cardinality.
    #[error("task index {index} out of range for batch of {len}")]
    IndexOutOfRange { index: u32, len: usize },

    /// The collector was drained while slots were still unfilled. This is a
    /// programming error in the caller, not a recoverable runtime condition.
    #[error("batch drained before completion: {missing} of {len} slots unfilled")]
    IncompleteBatch { missing: usize, len: usize },
}
