//! Process-pool strategy tests.
//!
//! The pool re-executes this test binary as its worker: [`worker_entry`] is
//! a regular test when run by the harness, and the worker loop when the pool
//! spawns it with the worker environment marker set.

use anyhow::Result;
use batchline::error::TaskError;
use batchline::{OperationRegistry, StrategyConfig, Task, Value, WorkerCommand, submit, value, worker};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn worker_registry() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry.register_fn("add", |args| {
        Ok(Value::Int(value::require_int(args, "a")? + value::require_int(args, "b")?))
    });
    registry.register_fn("sleep_then", |args| {
        let ms = value::require_int(args, "ms")? as u64;
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Value::Int(value::require_int(args, "value")?))
    });
    registry.register_fn("die", |_| {
        // Hard exit, bypassing the per-task failure boundary: the parent
        // must observe this as a worker crash, not an operation failure.
        std::process::exit(86);
    });
    registry
}

#[test]
fn worker_entry() {
    if worker::is_worker() {
        let registry = worker_registry();
        worker::run_worker(&registry).expect("worker loop failed");
    }
}

fn config() -> StrategyConfig {
    let command = WorkerCommand::current_exe(vec![
        "worker_entry".to_string(),
        "--exact".to_string(),
        "--nocapture".to_string(),
        // Terse output: the default format prints `test worker_entry ... `
        // without a newline before the test runs, which would prefix the
        // worker's first response frame and break line framing.
        "--quiet".to_string(),
    ])
    .expect("locate test binary");
    StrategyConfig::process_pool().with_concurrency(2).with_worker(command)
}

#[test]
fn process_pool_runs_batch() -> Result<()> {
    let tasks: Vec<Task> = (0..8)
        .map(|i| Task::new(i, "add").with_arg("a", i as i64).with_arg("b", 1000i64))
        .collect();

    let outcomes = submit::run(tasks, config(), Arc::new(worker_registry()))?;
    assert_eq!(outcomes.len(), 8);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i as u32);
        assert_eq!(outcome.value(), Some(&Value::Int(i as i64 + 1000)));
    }
    Ok(())
}

/// A task that kills its worker produces a `WorkerCrash` failure for itself
/// only; the pool respawns the worker so the pool stays at its configured
/// size and the remaining tasks complete. Run with a single worker: tasks
/// queued behind the crash can only complete through the replacement, so a
/// failed respawn would surface as an incomplete batch.
#[test]
fn worker_crash_is_isolated_and_pool_self_heals() -> Result<()> {
    let mut tasks: Vec<Task> = (0..6)
        .map(|i| Task::new(i, "add").with_arg("a", i as i64).with_arg("b", 0i64))
        .collect();
    tasks[2] = Task::new(2, "die");

    let config = config().with_concurrency(1);
    let outcomes = submit::run(tasks, config, Arc::new(worker_registry()))?;
    assert_eq!(outcomes.len(), 6);
    assert!(matches!(outcomes[2].error(), Some(TaskError::WorkerCrash(_))));
    for (i, outcome) in outcomes.iter().enumerate() {
        if i != 2 {
            assert_eq!(outcome.value(), Some(&Value::Int(i as i64)), "task {i} did not survive");
        }
    }
    Ok(())
}

/// Unlike threads, worker processes are killed at the deadline, so the
/// caller is released promptly even with every worker mid-task.
#[test]
fn deadline_kills_workers_and_releases_caller() -> Result<()> {
    let tasks: Vec<Task> = (0..2)
        .map(|i| Task::new(i, "sleep_then").with_arg("ms", 2000i64).with_arg("value", 0i64))
        .collect();
    let config = config().with_timeout(Duration::from_millis(80));

    let started = Instant::now();
    let outcomes = submit::run(tasks, config, Arc::new(worker_registry()))?;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(1500), "caller blocked for {elapsed:?}");
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_eq!(outcome.error(), Some(&TaskError::TimeoutExceeded));
    }
    Ok(())
}
