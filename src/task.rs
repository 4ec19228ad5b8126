//! Tasks and their outcomes.
//!
//! A [`Task`] is an immutable description of one unit of work: the operation
//! to apply, its keyed arguments, and an ordinal index. The index is unique
//! within a batch and determines where the result lands — it says nothing
//! about execution order. Every submitted task produces exactly one
//! [`Outcome`] at its own index.

use crate::error::TaskError;
use crate::value::{ArgMap, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque string key into an [`OperationRegistry`](crate::registry::OperationRegistry).
///
/// Unlike a live function reference, an id crosses process boundaries: the
/// worker re-resolves it against its own registry built from the same
/// registration code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of submitted work. Immutable once created; build with
/// [`Task::new`] and [`Task::with_arg`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Result-slot index, unique within the batch.
    pub index: u32,
    /// Registry key of the operation to apply.
    pub op: OperationId,
    /// Keyed arguments, all process-boundary safe.
    pub args: ArgMap,
}

impl Task {
    pub fn new(index: u32, op: impl Into<OperationId>) -> Self {
        Self { index, op: op.into(), args: ArgMap::new() }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: ArgMap) -> Self {
        self.args = args;
        self
    }
}

/// Terminal status of one task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Status {
    /// The operation returned a value.
    Success(Value),
    /// The operation (or its worker) failed; siblings are unaffected.
    Failure(TaskError),
    /// Fail-fast cancellation hit before the task was attempted. Explicitly
    /// marked rather than silently absent.
    Skipped,
}

/// The result of exactly one task, addressed by the task's own index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub index: u32,
    pub status: Status,
}

impl Outcome {
    pub fn success(index: u32, value: Value) -> Self {
        Self { index, status: Status::Success(value) }
    }

    pub fn failure(index: u32, error: TaskError) -> Self {
        Self { index, status: Status::Failure(error) }
    }

    pub fn skipped(index: u32) -> Self {
        Self { index, status: Status::Skipped }
    }

    pub fn from_result(index: u32, result: Result<Value, TaskError>) -> Self {
        match result {
            Ok(v) => Self::success(index, v),
            Err(e) => Self::failure(index, e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Status::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failure(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, Status::Skipped)
    }

    /// The success value, if any.
    pub fn value(&self) -> Option<&Value> {
        match &self.status {
            Status::Success(v) => Some(v),
            _ => None,
        }
    }

    /// The failure record, if any.
    pub fn error(&self) -> Option<&TaskError> {
        match &self.status {
            Status::Failure(e) => Some(e),
            _ => None,
        }
    }
}
