//! OS-process-pool strategy.
//!
//! A fixed set of worker processes, each with private memory, serve tasks
//! over line-framed JSON (see [`crate::worker`]). Arguments and operation ids
//! are serialized across the boundary; the worker re-resolves each id against
//! its own registry.
//!
//! The strategy's main value over the thread pool is crash isolation: a task
//! that corrupts its process or segfaults takes down only itself. The parent
//! detects the abnormal exit, records a `WorkerCrash` failure for the task
//! that was in flight, and respawns the worker so remaining tasks are not
//! starved. On deadline, workers *are* forcibly killed — processes, unlike
//! threads, can be terminated and reaped safely.

use crate::collector::ResultCollector;
use crate::pool::{PidRoster, ProcessWorker, WorkerCommand, default_process_workers};
use crate::strategy::{self, CancelReason, CancelToken, StrategyConfig};
use crate::task::{Outcome, Task};
use crate::worker::WireOutcome;
use anyhow::Result;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub(crate) fn run(
    tasks: Vec<Task>,
    collector: Arc<ResultCollector>,
    cancel: CancelToken,
    config: &StrategyConfig,
) -> Result<()> {
    let workers = if config.concurrency == 0 {
        default_process_workers()
    } else {
        config.concurrency
    };
    let workers = workers.min(tasks.len()).max(1);

    let command = match &config.worker {
        Some(cmd) => cmd.clone(),
        None => WorkerCommand::current_exe(Vec::new())?,
    };

    let roster = PidRoster::new();
    let mut spawned = Vec::with_capacity(workers);
    for _ in 0..workers {
        let worker = ProcessWorker::spawn(&command)?;
        roster.track(worker.pid());
        spawned.push(worker);
    }

    let total = tasks.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
    let (tx, rx) = mpsc::channel::<u32>();
    let fail_fast = config.fail_fast;

    thread::scope(|scope| {
        for worker in spawned.drain(..) {
            let queue = Arc::clone(&queue);
            let collector = Arc::clone(&collector);
            let cancel = cancel.clone();
            let roster = roster.clone();
            let command = &command;
            let tx = tx.clone();
            scope.spawn(move || {
                serve(worker, command, queue, collector, cancel, roster, tx, fail_fast);
            });
        }
        drop(tx);

        // Deadline watch: the worker threads block on child stdout, so the
        // orchestrator delivers the kill that unblocks them.
        let mut completed = 0usize;
        while completed < total {
            let wait = cancel.remaining().unwrap_or(Duration::from_secs(3600));
            match rx.recv_timeout(wait) {
                Ok(_) => completed += 1,
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.cancelled().is_some() {
                        debug!("deadline reached; killing {workers} worker processes");
                        roster.kill_all();
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    Ok(())
}

/// One parent-side thread driving one worker process until the queue drains,
/// cancellation fires, or the worker cannot be replaced.
#[allow(clippy::too_many_arguments)]
fn serve(
    mut worker: ProcessWorker,
    command: &WorkerCommand,
    queue: Arc<Mutex<VecDeque<Task>>>,
    collector: Arc<ResultCollector>,
    cancel: CancelToken,
    roster: PidRoster,
    tx: mpsc::Sender<u32>,
    fail_fast: bool,
) {
    loop {
        if cancel.cancelled().is_some() {
            break;
        }
        let Some(task) = queue.lock().unwrap().pop_front() else {
            break;
        };
        let index = task.index;

        match worker.exchange::<Task, WireOutcome>(&task) {
            Ok(frame) => {
                let failed = frame.result.is_err();
                collector.set_if_vacant(Outcome::from_result(index, frame.result));
                if failed && fail_fast {
                    cancel.cancel(CancelReason::FailFast);
                }
            }
            Err(err) => {
                if let Some(reason) = cancel.cancelled() {
                    // The exchange died because we killed the worker.
                    collector.set_if_vacant(strategy::not_attempted(index, reason));
                    let _ = tx.send(index);
                    break;
                }
                let old_pid = worker.pid();
                warn!("worker pid {old_pid} crashed on task {index}: {err:#}");
                collector.set_if_vacant(Outcome::failure(
                    index,
                    crate::error::TaskError::WorkerCrash(format!("{err:#}")),
                ));
                if fail_fast {
                    cancel.cancel(CancelReason::FailFast);
                } else {
                    match ProcessWorker::spawn(command) {
                        Ok(fresh) => {
                            roster.replace(old_pid, fresh.pid());
                            worker = fresh;
                        }
                        Err(spawn_err) => {
                            warn!("could not respawn worker: {spawn_err:#}");
                            let _ = tx.send(index);
                            break;
                        }
                    }
                }
            }
        }
        let _ = tx.send(index);
    }
    // `worker` drops here: killed and reaped.
}
