use anyhow::Result;
use batchline::error::{BatchError, TaskError};
use batchline::{OperationRegistry, Status, StrategyConfig, Task, Value, submit, value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn test_registry() -> Arc<OperationRegistry> {
    let mut registry = OperationRegistry::new();
    registry.register_fn("add", |args| {
        Ok(Value::Int(value::require_int(args, "a")? + value::require_int(args, "b")?))
    });
    registry.register_fn("sleep_then", |args| {
        let ms = value::require_int(args, "ms")? as u64;
        std::thread::sleep(Duration::from_millis(ms));
        Ok(Value::Int(value::require_int(args, "value")?))
    });
    registry.register_fn("boom", |_| anyhow::bail!("boom"));
    registry.register_fn("panicky", |_| panic!("kaboom"));
    Arc::new(registry)
}

fn add_tasks(n: u32) -> Vec<Task> {
    (0..n)
        .map(|i| Task::new(i, "add").with_arg("a", i as i64).with_arg("b", 100i64))
        .collect()
}

#[test]
fn cooperative_runs_all_tasks_in_index_order() -> Result<()> {
    let outcomes = submit::run(add_tasks(8), StrategyConfig::cooperative(), test_registry())?;
    assert_eq!(outcomes.len(), 8);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i as u32);
        assert_eq!(outcome.value(), Some(&Value::Int(i as i64 + 100)));
    }
    Ok(())
}

/// The slowest task is submitted first; its outcome must still land at its
/// own index, not at the end.
#[test]
fn thread_pool_result_order_is_submission_order() -> Result<()> {
    let mut tasks = vec![
        Task::new(0, "sleep_then").with_arg("ms", 150i64).with_arg("value", 0i64),
    ];
    for i in 1..6u32 {
        tasks.push(Task::new(i, "sleep_then").with_arg("ms", 1i64).with_arg("value", i as i64));
    }

    let config = StrategyConfig::thread_pool().with_concurrency(4);
    let outcomes = submit::run(tasks, config, test_registry())?;
    assert_eq!(outcomes.len(), 6);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i as u32);
        assert_eq!(outcome.value(), Some(&Value::Int(i as i64)));
    }
    Ok(())
}

#[test]
fn thread_pool_isolates_one_failing_task() -> Result<()> {
    let mut tasks = add_tasks(10);
    tasks[3] = Task::new(3, "boom");

    let config = StrategyConfig::thread_pool().with_concurrency(4);
    let outcomes = submit::run(tasks, config, test_registry())?;

    assert_eq!(outcomes.len(), 10);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 9);
    match outcomes[3].error() {
        Some(TaskError::OperationFailed(msg)) => assert!(msg.contains("boom")),
        other => panic!("expected OperationFailed, got {other:?}"),
    }
    Ok(())
}

#[test]
fn panics_are_captured_per_task() -> Result<()> {
    let mut tasks = add_tasks(4);
    tasks[1] = Task::new(1, "panicky");

    let outcomes = submit::run(tasks, StrategyConfig::cooperative(), test_registry())?;
    assert_eq!(outcomes.len(), 4);
    match outcomes[1].error() {
        Some(TaskError::OperationFailed(msg)) => assert!(msg.contains("kaboom")),
        other => panic!("expected OperationFailed, got {other:?}"),
    }
    assert!(outcomes[0].is_success() && outcomes[2].is_success() && outcomes[3].is_success());
    Ok(())
}

#[test]
fn empty_batch_returns_immediately() -> Result<()> {
    for config in [
        StrategyConfig::cooperative(),
        StrategyConfig::thread_pool(),
        StrategyConfig::process_pool(),
    ] {
        let outcomes = submit::run(Vec::new(), config, test_registry())?;
        assert!(outcomes.is_empty());
    }
    Ok(())
}

#[test]
fn unknown_operation_rejects_whole_batch_before_dispatch() {
    let mut tasks = add_tasks(3);
    tasks[2] = Task::new(2, "no_such_op");

    let err = submit::submit(tasks, StrategyConfig::thread_pool(), test_registry()).unwrap_err();
    match err.downcast_ref::<BatchError>() {
        Some(BatchError::UnknownOperation(name)) => assert_eq!(name, "no_such_op"),
        other => panic!("expected UnknownOperation, got {other:?}"),
    }
}

#[test]
fn duplicate_index_rejects_whole_batch() {
    let tasks = vec![
        Task::new(0, "add").with_arg("a", 1i64).with_arg("b", 2i64),
        Task::new(0, "add").with_arg("a", 3i64).with_arg("b", 4i64),
    ];
    let err = submit::submit(tasks, StrategyConfig::cooperative(), test_registry()).unwrap_err();
    assert!(matches!(err.downcast_ref::<BatchError>(), Some(BatchError::DuplicateIndex(0))));
}

/// Cooperative dispatch is sequential, so fail-fast behavior is
/// deterministic: everything before the failure succeeds, everything after
/// is explicitly skipped, nothing is silently absent.
#[test]
fn fail_fast_marks_unattempted_tasks_skipped() -> Result<()> {
    let mut tasks = add_tasks(5);
    tasks[1] = Task::new(1, "boom");

    let config = StrategyConfig::cooperative().with_fail_fast(true);
    let outcomes = submit::run(tasks, config, test_registry())?;

    assert_eq!(outcomes.len(), 5);
    assert!(outcomes[0].is_success());
    assert!(outcomes[1].is_failure());
    for outcome in &outcomes[2..] {
        assert_eq!(outcome.status, Status::Skipped);
    }
    Ok(())
}

/// A 50ms deadline against a 500ms task: the caller gets its outcomes close
/// to the deadline, with the in-flight and unattempted tasks both marked
/// `TimeoutExceeded`, and the still-running thread is left to the reaper.
#[test]
fn thread_pool_deadline_does_not_block_the_caller() -> Result<()> {
    let tasks = vec![
        Task::new(0, "sleep_then").with_arg("ms", 500i64).with_arg("value", 0i64),
        Task::new(1, "sleep_then").with_arg("ms", 500i64).with_arg("value", 1i64),
    ];
    let config = StrategyConfig::thread_pool()
        .with_concurrency(1)
        .with_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let outcomes = submit::run(tasks, config, test_registry())?;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(400), "caller blocked for {elapsed:?}");
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_eq!(outcome.error(), Some(&TaskError::TimeoutExceeded));
    }
    Ok(())
}

/// Cooperative dispatch is sequential and the deadline is observed at the
/// suspension point before each dispatch: the task running when the
/// deadline passes completes (blocking sections are not preempted), every
/// task after it is marked `TimeoutExceeded` without being dispatched.
#[test]
fn cooperative_deadline_is_observed_between_dispatches() -> Result<()> {
    let tasks: Vec<Task> = (0..3)
        .map(|i| Task::new(i, "sleep_then").with_arg("ms", 100i64).with_arg("value", i as i64))
        .collect();
    let config = StrategyConfig::cooperative().with_timeout(Duration::from_millis(50));

    let started = Instant::now();
    let outcomes = submit::run(tasks, config, test_registry())?;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(250), "batch ran past the deadline for {elapsed:?}");
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].error(), Some(&TaskError::TimeoutExceeded));
    assert_eq!(outcomes[2].error(), Some(&TaskError::TimeoutExceeded));
    Ok(())
}

/// Caller-driven cancellation: the first task is deterministically in flight
/// when the handle is cancelled, so it completes while the queued tasks are
/// skipped.
#[test]
fn cancel_skips_tasks_not_yet_started() -> Result<()> {
    let started = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));

    let mut registry = OperationRegistry::new();
    let started_flag = Arc::clone(&started);
    let gate = Arc::clone(&release);
    registry.register_fn("gated", move |_| {
        started_flag.store(true, Ordering::SeqCst);
        while !gate.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(Value::Bool(true))
    });
    let registry = Arc::new(registry);

    let tasks: Vec<Task> = (0..3).map(|i| Task::new(i, "gated")).collect();
    let config = StrategyConfig::thread_pool().with_concurrency(1);
    let handle = submit::submit(tasks, config, registry)?;

    while !started.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(1));
    }
    handle.cancel();
    release.store(true, Ordering::SeqCst);

    let outcomes = handle.wait()?;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert!(outcomes[1].is_skipped());
    assert!(outcomes[2].is_skipped());
    Ok(())
}
