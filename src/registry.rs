//! Named operations and the registry that resolves them.
//!
//! An [`Operation`] is a pure, reusable function over an [`ArgMap`]. The
//! [`OperationRegistry`] maps string ids to operations and is read-only after
//! construction, so concurrent lookup from any number of workers is safe.
//!
//! The registry is deliberately rebuildable from registration code alone: a
//! live `Arc<dyn Operation>` cannot cross a process boundary, but the id can,
//! and a worker process re-runs the same registration function to resolve it
//! (see [`crate::worker`]).

use crate::error::TaskError;
use crate::task::OperationId;
use crate::value::{ArgMap, Value};
use anyhow::Result;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// A callable unit of work. Implementations must be side-effect isolated:
/// the only shared structure a task may touch is its own result slot.
pub trait Operation: Send + Sync {
    fn call(&self, args: &ArgMap) -> Result<Value>;
}

/// Adapter so plain closures register without a named type.
struct FnOperation<F>(F);

impl<F> Operation for FnOperation<F>
where
    F: Fn(&ArgMap) -> Result<Value> + Send + Sync,
{
    fn call(&self, args: &ArgMap) -> Result<Value> {
        (self.0)(args)
    }
}

/// Mapping from operation name to implementation.
///
/// Construct once, register everything, then share behind an `Arc`. There is
/// no mutation after that point.
#[derive(Default)]
pub struct OperationRegistry {
    ops: BTreeMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, op: impl Operation + 'static) {
        self.ops.insert(name.into(), Arc::new(op));
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&ArgMap) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(name, FnOperation(f));
    }

    /// Resolve an id to its operation, or report the registry miss.
    pub fn resolve(&self, id: &OperationId) -> Result<Arc<dyn Operation>, TaskError> {
        self.ops
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| TaskError::UnknownOperation(id.to_string()))
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.ops.contains_key(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Run one operation with the per-task failure boundary applied: errors and
/// panics are both captured into a [`TaskError`] instead of unwinding into
/// the executing worker.
pub(crate) fn invoke(op: &dyn Operation, args: &ArgMap) -> Result<Value, TaskError> {
    match catch_unwind(AssertUnwindSafe(|| op.call(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TaskError::OperationFailed(format!("{err:#}"))),
        Err(panic) => Err(TaskError::OperationFailed(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("operation panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("operation panicked: {s}")
    } else {
        "operation panicked".to_string()
    }
}
