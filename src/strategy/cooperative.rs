//! Single-threaded cooperative strategy.
//!
//! All tasks of the batch are spawned onto one `futures` [`LocalPool`] and
//! interleave at explicit suspension points: each task yields once before its
//! operation is dispatched, which is where the deadline and fail-fast flags
//! are observed. The operation call itself is a blocking section — this is
//! cooperative yielding *around* blocking calls, not non-blocking I/O, so a
//! CPU-bound operation starves its siblings. That is a documented property of
//! the strategy, and operations intended for it should be I/O-dominant.

use crate::collector::ResultCollector;
use crate::registry::{self, Operation};
use crate::strategy::{self, CancelToken, StrategyConfig};
use crate::task::{Outcome, Task};
use anyhow::{Result, anyhow};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Reschedule the current future behind its siblings. This is the strategy's
/// suspension point.
fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.yielded {
            Poll::Ready(())
        } else {
            this.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub(crate) fn run(
    tasks: Vec<Task>,
    ops: Vec<Arc<dyn Operation>>,
    collector: Arc<ResultCollector>,
    cancel: CancelToken,
    config: &StrategyConfig,
) -> Result<()> {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let fail_fast = config.fail_fast;

    for (task, op) in tasks.into_iter().zip(ops) {
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        spawner
            .spawn_local(async move {
                yield_now().await;
                let index = task.index;
                if let Some(reason) = cancel.cancelled() {
                    // Not yet started: abort softly, preserve nothing.
                    collector.set(strategy::not_attempted(index, reason));
                    return;
                }
                let result = registry::invoke(op.as_ref(), &task.args);
                let failed = result.is_err();
                collector.set(Outcome::from_result(index, result));
                if failed && fail_fast {
                    cancel.cancel(strategy::CancelReason::FailFast);
                }
            })
            .map_err(|e| anyhow!("spawn cooperative task: {e}"))?;
    }

    // Drives every spawned task to completion on the calling thread.
    pool.run();
    Ok(())
}
