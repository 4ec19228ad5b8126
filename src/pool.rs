//! Scoped acquisition and teardown of strategy workers.
//!
//! Each strategy's underlying resource — the rayon thread set or the child
//! process set — is acquired here and guaranteed released on every exit path:
//! thread pools are handed to a reaper so in-flight work never blocks the
//! orchestrator past its deadline, and child processes are killed and reaped
//! on drop.
//!
//! Default sizing is a bounded fraction of hardware concurrency so the
//! thread- and process-pool strategies do not oversubscribe the host when
//! both are in use.

use crate::worker::WORKER_ENV;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// Default worker count for the thread-pool strategy.
pub fn default_thread_workers() -> usize {
    (num_cpus::get() / 2).max(2)
}

/// Default worker count for the process-pool strategy.
pub fn default_process_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Build a dedicated, fixed-size rayon pool for one batch.
pub fn build_thread_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("batchline-worker-{i}"))
        .build()
        .context("build thread pool")
}

/// Release a thread pool without blocking the orchestrator on stragglers.
///
/// Dropping a rayon pool waits for all spawned work to finish; tasks already
/// running past a deadline are not preempted, so the drop is handed to a
/// short-lived reaper thread and the orchestrator returns immediately.
pub fn retire_thread_pool(pool: rayon::ThreadPool) {
    let spawned = thread::Builder::new()
        .name("batchline-reaper".to_string())
        .spawn(move || drop(pool));
    if spawned.is_err() {
        warn!("could not spawn pool reaper; releasing inline");
    }
}

/// How to launch a worker process for the process-pool strategy.
///
/// The default re-executes the current binary with no extra arguments; the
/// host is expected to route into [`crate::worker::run_worker`] when it sees
/// the worker environment marker.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Re-invoke the current executable, passing `args` through.
    pub fn current_exe(args: Vec<String>) -> Result<Self> {
        let program = std::env::current_exe().context("locate current executable")?;
        Ok(Self { program, args })
    }

    fn spawn(&self) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn worker process {}", self.program.display()))
    }
}

/// A single pooled worker process with line-framed JSON on stdin/stdout.
pub struct ProcessWorker {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ProcessWorker {
    pub fn spawn(command: &WorkerCommand) -> Result<Self> {
        let mut child = command.spawn()?;
        let stdin = child.stdin.take().context("worker stdin unavailable")?;
        let stdout = child.stdout.take().context("worker stdout unavailable")?;
        debug!("spawned worker process pid {}", child.id());
        Ok(Self { child, stdin, stdout: BufReader::new(stdout) })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send one request frame and block until the matching response frame.
    ///
    /// Stdout lines that do not parse as a response are skipped; a test
    /// harness wrapping the worker loop may emit its own chatter. EOF or an
    /// I/O failure means the worker died mid-task.
    pub fn exchange<Req, Resp>(&mut self, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let frame = serde_json::to_string(request).context("encode worker request")?;
        self.stdin
            .write_all(frame.as_bytes())
            .and_then(|()| self.stdin.write_all(b"\n"))
            .and_then(|()| self.stdin.flush())
            .with_context(|| format!("write to worker pid {}", self.pid()))?;

        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .stdout
                .read_line(&mut line)
                .with_context(|| format!("read from worker pid {}", self.pid()))?;
            if n == 0 {
                anyhow::bail!("worker pid {} closed its stdout (abnormal exit)", self.pid());
            }
            if let Ok(resp) = serde_json::from_str::<Resp>(line.trim_end()) {
                return Ok(resp);
            }
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        // Kill then reap so no zombie outlives the pool scope.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Shared registry of live worker pids, used to deliver a kill on deadline
/// while the owning threads are blocked reading worker stdout.
#[derive(Clone, Default)]
pub struct PidRoster {
    pids: Arc<Mutex<Vec<u32>>>,
}

impl PidRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, pid: u32) {
        self.pids.lock().unwrap().push(pid);
    }

    pub fn replace(&self, old: u32, new: u32) {
        let mut pids = self.pids.lock().unwrap();
        if let Some(slot) = pids.iter_mut().find(|p| **p == old) {
            *slot = new;
        } else {
            pids.push(new);
        }
    }

    /// Forcibly terminate every tracked worker. Process-pool tasks, unlike
    /// thread-pool tasks, can be stopped mid-flight.
    pub fn kill_all(&self) {
        let pids = self.pids.lock().unwrap();
        for pid in pids.iter() {
            debug!("killing worker process pid {pid}");
            unsafe {
                libc::kill(*pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
}
