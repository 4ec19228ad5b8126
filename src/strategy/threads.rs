//! OS-thread-pool strategy.
//!
//! Tasks run on a dedicated, fixed-size rayon pool built for the batch.
//! Memory is shared by reference; the isolation discipline is that each task
//! writes only to its own result slot. A failing or panicking operation is
//! captured at the per-task boundary and never aborts siblings or the pool.
//!
//! Threads cannot be safely preempted, so on deadline the orchestrator marks
//! every vacant slot `TimeoutExceeded` and retires the pool to a reaper;
//! tasks already running continue to completion off to the side, and their
//! late results are dropped by the first-writer-wins slot rule.

use crate::collector::ResultCollector;
use crate::pool;
use crate::registry::{self, Operation};
use crate::strategy::{self, CancelReason, CancelToken, StrategyConfig};
use crate::task::{Outcome, Task};
use anyhow::Result;
use log::debug;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

pub(crate) fn run(
    tasks: Vec<Task>,
    ops: Vec<Arc<dyn Operation>>,
    collector: Arc<ResultCollector>,
    cancel: CancelToken,
    config: &StrategyConfig,
) -> Result<()> {
    let workers = if config.concurrency == 0 {
        pool::default_thread_workers()
    } else {
        config.concurrency
    };
    let thread_pool = pool::build_thread_pool(workers.min(tasks.len()))?;
    let fail_fast = config.fail_fast;
    let total = tasks.len();

    let (tx, rx) = mpsc::channel::<u32>();
    for (task, op) in tasks.into_iter().zip(ops) {
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        let tx = tx.clone();
        thread_pool.spawn(move || {
            let index = task.index;
            // Deadline and fail-fast are observed at pickup; a task that has
            // started runs to completion.
            if let Some(reason) = cancel.cancelled() {
                collector.set_if_vacant(strategy::not_attempted(index, reason));
            } else {
                let result = registry::invoke(op.as_ref(), &task.args);
                let failed = result.is_err();
                collector.set_if_vacant(Outcome::from_result(index, result));
                if failed && fail_fast {
                    cancel.cancel(CancelReason::FailFast);
                }
            }
            let _ = tx.send(index);
        });
    }
    drop(tx);

    let mut completed = 0usize;
    while completed < total {
        let wait = cancel.remaining().unwrap_or(Duration::from_secs(3600));
        match rx.recv_timeout(wait) {
            Ok(_) => completed += 1,
            Err(RecvTimeoutError::Timeout) => {
                if cancel.cancelled().is_some() {
                    debug!("deadline reached with {} of {total} tasks finished", completed);
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pool::retire_thread_pool(thread_pool);
    Ok(())
}
