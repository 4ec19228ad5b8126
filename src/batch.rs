//! Bulk tabular batch pipeline.
//!
//! A [`BatchJob`] walks the state machine
//! `Pending → Reading → Transforming → Writing → Done` (with `Failed`
//! reachable from any non-terminal state), building one task per source file
//! per stage and submitting each stage to the configured strategy. Failures
//! are isolated per file: a source that fails to parse loses its table but
//! never aborts the batch, unless fail-fast is configured.
//!
//! Tables cross the execution boundary in serialized form (`Value::Bytes` of
//! canonical delimited data), which is what lets the same job run unchanged
//! on the cooperative, thread-pool, and process-pool strategies.

use crate::error::TaskError;
use crate::io::csv;
use crate::registry::{Operation, OperationRegistry};
use crate::strategy::StrategyConfig;
use crate::submit;
use crate::table::Table;
use crate::task::{OperationId, Outcome, Status, Task};
use crate::value::{self, ArgMap, Value};
use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Pipeline states. `Done` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Reading,
    Transforming,
    Writing,
    Done,
    Failed,
}

/// Where one source ended up.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceStatus {
    /// The source passed every configured stage.
    Done,
    /// The source failed at `stage`; siblings were unaffected.
    Failed { stage: BatchState, error: TaskError },
    /// Fail-fast cancellation stopped the job before this source was
    /// attempted at `stage`.
    Skipped { stage: BatchState },
}

/// Per-source result of a finished job.
#[derive(Clone, Debug)]
pub struct SourceReport {
    pub source: PathBuf,
    /// The written file, when the job has an output directory and the source
    /// reached the writing stage.
    pub output: Option<PathBuf>,
    pub status: SourceStatus,
}

/// Everything a finished job reports.
#[derive(Debug)]
pub struct BatchReport {
    pub state: BatchState,
    pub sources: Vec<SourceReport>,
    /// In-memory tables, aligned with `sources`, for jobs without an output
    /// directory. Once a table is written to a file the job holds no further
    /// reference, so this stays empty in that mode.
    pub tables: Vec<Option<Table>>,
}

/// Builder and driver for one batch run. Created per invocation; no state
/// outlives the returned [`BatchReport`].
pub struct BatchJob {
    sources: Vec<PathBuf>,
    transform: Option<OperationId>,
    output_dir: Option<PathBuf>,
    config: StrategyConfig,
}

impl BatchJob {
    pub fn new(config: StrategyConfig) -> Self {
        Self { sources: Vec::new(), transform: None, output_dir: None, config }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Add every file matching `pattern`, in sorted order.
    pub fn source_glob(mut self, pattern: &str) -> Result<Self> {
        self.sources.extend(crate::io::glob::expand_glob(pattern)?);
        Ok(self)
    }

    /// Apply `op` to each successfully read table. The operation receives
    /// the table as serialized bytes under the `table` argument and returns
    /// it the same way; see [`table_operation`] for the ergonomic wrapper.
    pub fn transform(mut self, op: impl Into<OperationId>) -> Self {
        self.transform = Some(op.into());
        self
    }

    /// Write resulting tables into `dir` (named after their source files)
    /// instead of returning them in memory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Run the pipeline to a terminal state.
    ///
    /// The registry must contain the built-in table operations (see
    /// [`register_table_ops`]) plus any configured transform. Batch-level
    /// misconfiguration fails here before any task runs; per-source failures
    /// land in the report instead.
    pub fn run(self, registry: &Arc<OperationRegistry>) -> Result<BatchReport> {
        if let Some(op) = &self.transform
            && !registry.contains(op)
        {
            anyhow::bail!(crate::error::BatchError::UnknownOperation(op.to_string()));
        }

        let total = self.sources.len();
        if total == 0 {
            debug!("batch job with no sources; done immediately");
            return Ok(BatchReport { state: BatchState::Done, sources: Vec::new(), tables: Vec::new() });
        }

        let mut progress: Vec<Progress> = Vec::with_capacity(total);
        let mut outputs: Vec<Option<PathBuf>> = vec![None; total];

        // Reading: one task per source file, duplicates included.
        debug!("batch job: reading {total} sources");
        let read_tasks: Vec<Task> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, path)| {
                Task::new(i as u32, OP_TABLE_READ).with_arg("path", path.display().to_string())
            })
            .collect();
        let outcomes = submit::run(read_tasks, self.config.clone(), Arc::clone(registry))?;
        let mut aborted = false;
        for outcome in outcomes {
            progress.push(Progress::from_outcome(outcome, BatchState::Reading, &mut aborted));
        }

        // Transforming: one task per surviving table.
        if let Some(op) = &self.transform
            && !aborted
        {
            let (tasks, map) = stage_tasks(&progress, |bytes| {
                ArgMap::from([("table".to_string(), Value::Bytes(bytes.to_vec()))])
            }, op.clone());
            debug!("batch job: transforming {} tables with `{op}`", tasks.len());
            let outcomes = submit::run(tasks, self.config.clone(), Arc::clone(registry))?;
            apply_stage(&mut progress, &map, outcomes, BatchState::Transforming, &mut aborted);
        }

        // Writing: one task per resulting table.
        if let Some(dir) = &self.output_dir
            && !aborted
        {
            let (tasks, map) = stage_tasks(&progress, |bytes| {
                ArgMap::from([("table".to_string(), Value::Bytes(bytes.to_vec()))])
            }, OperationId::new(OP_TABLE_WRITE));
            let tasks: Vec<Task> = tasks
                .into_iter()
                .zip(map.iter())
                .map(|(task, &src)| {
                    let name = self.sources[src]
                        .file_name()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from(format!("table-{src}.csv")));
                    let target = dir.join(name);
                    outputs[src] = Some(target.clone());
                    task.with_arg("path", target.display().to_string())
                })
                .collect();
            debug!("batch job: writing {} tables to {}", tasks.len(), dir.display());
            let outcomes = submit::run(tasks, self.config.clone(), Arc::clone(registry))?;
            apply_stage(&mut progress, &map, outcomes, BatchState::Writing, &mut aborted);
        }

        // Sources still live when fail-fast stopped the job were never
        // attempted at the following stage.
        if aborted && let Some(next) = self.next_stage_after(&progress) {
            for p in progress.iter_mut() {
                if matches!(p, Progress::Live(_)) {
                    *p = Progress::Skipped { stage: next };
                }
            }
        }

        self.assemble(progress, outputs, aborted)
    }

    /// The stage a still-live source would have entered next, used to stamp
    /// skip markers after a fail-fast abort.
    fn next_stage_after(&self, progress: &[Progress]) -> Option<BatchState> {
        let reached = progress
            .iter()
            .filter_map(|p| match p {
                Progress::Failed { stage, .. } | Progress::Skipped { stage } => Some(*stage),
                Progress::Live(_) => None,
            })
            .max_by_key(|s| stage_rank(*s))?;
        match reached {
            BatchState::Reading if self.transform.is_some() => Some(BatchState::Transforming),
            BatchState::Reading | BatchState::Transforming if self.output_dir.is_some() => {
                Some(BatchState::Writing)
            }
            _ => None,
        }
    }

    fn assemble(
        self,
        progress: Vec<Progress>,
        outputs: Vec<Option<PathBuf>>,
        aborted: bool,
    ) -> Result<BatchReport> {
        let keep_tables = self.output_dir.is_none();
        let mut sources = Vec::with_capacity(progress.len());
        let mut tables = Vec::with_capacity(if keep_tables { progress.len() } else { 0 });

        for ((path, progress), output) in self.sources.into_iter().zip(progress).zip(outputs) {
            let (status, table) = match progress {
                Progress::Live(bytes) => {
                    let table = if keep_tables {
                        Some(csv::parse(&bytes).context("re-parse table for report")?)
                    } else {
                        None
                    };
                    (SourceStatus::Done, table)
                }
                Progress::Failed { stage, error } => (SourceStatus::Failed { stage, error }, None),
                Progress::Skipped { stage } => (SourceStatus::Skipped { stage }, None),
            };
            if keep_tables {
                tables.push(table);
            }
            let output = if matches!(status, SourceStatus::Done) { output } else { None };
            sources.push(SourceReport { source: path, output, status });
        }

        let state = if aborted { BatchState::Failed } else { BatchState::Done };
        debug!("batch job finished in state {state:?}");
        Ok(BatchReport { state, sources, tables })
    }
}

/// Stage-local bookkeeping for one source.
enum Progress {
    /// Serialized table bytes, alive through the next stage.
    Live(Vec<u8>),
    Failed { stage: BatchState, error: TaskError },
    Skipped { stage: BatchState },
}

impl Progress {
    fn from_outcome(outcome: Outcome, stage: BatchState, aborted: &mut bool) -> Self {
        match outcome.status {
            Status::Success(Value::Bytes(bytes)) => Progress::Live(bytes),
            Status::Success(_) => Progress::Live(Vec::new()),
            Status::Failure(error) => Progress::Failed { stage, error },
            Status::Skipped => {
                *aborted = true;
                Progress::Skipped { stage }
            }
        }
    }
}

fn stage_rank(stage: BatchState) -> u8 {
    match stage {
        BatchState::Pending => 0,
        BatchState::Reading => 1,
        BatchState::Transforming => 2,
        BatchState::Writing => 3,
        BatchState::Done | BatchState::Failed => 4,
    }
}

/// Build one task per live source, remembering which source each stage index
/// refers to.
fn stage_tasks(
    progress: &[Progress],
    make_args: impl Fn(&[u8]) -> ArgMap,
    op: impl Into<OperationId>,
) -> (Vec<Task>, Vec<usize>) {
    let op = op.into();
    let mut tasks = Vec::new();
    let mut map = Vec::new();
    for (src, p) in progress.iter().enumerate() {
        if let Progress::Live(bytes) = p {
            tasks.push(Task::new(map.len() as u32, op.clone()).with_args(make_args(bytes)));
            map.push(src);
        }
    }
    (tasks, map)
}

/// Route a stage's outcomes back to their sources.
fn apply_stage(
    progress: &mut [Progress],
    map: &[usize],
    outcomes: Vec<Outcome>,
    stage: BatchState,
    aborted: &mut bool,
) {
    for outcome in outcomes {
        let src = map[outcome.index as usize];
        match outcome.status {
            Status::Success(Value::Bytes(bytes)) => progress[src] = Progress::Live(bytes),
            // Writers return a row count; the table bytes stay as they were.
            Status::Success(_) => {}
            Status::Failure(error) => progress[src] = Progress::Failed { stage, error },
            Status::Skipped => {
                *aborted = true;
                progress[src] = Progress::Skipped { stage };
            }
        }
    }
}

const OP_TABLE_READ: &str = "table.read";
const OP_TABLE_WRITE: &str = "table.write";

/// Register the pipeline's built-in operations. Worker-process registries
/// must include these too when a process-pool job is run.
pub fn register_table_ops(registry: &mut OperationRegistry) {
    registry.register_fn(OP_TABLE_READ, |args| {
        let path = value::require_str(args, "path")?;
        let table = csv::read_table(path)?;
        Ok(Value::Bytes(csv::serialize(&table)?))
    });
    registry.register_fn(OP_TABLE_WRITE, |args| {
        let path = value::require_str(args, "path")?;
        let bytes = value::require_bytes(args, "table")?;
        let table = csv::parse(bytes).context("parse table argument")?;
        let rows = csv::write_table(path, &table)?;
        Ok(Value::Int(rows as i64))
    });
}

/// Wrap a `Table -> Table` function as an [`Operation`] that speaks the
/// pipeline's serialized-table convention.
pub fn table_operation<F>(f: F) -> impl Operation
where
    F: Fn(Table) -> Result<Table> + Send + Sync + 'static,
{
    TableOperation(f)
}

struct TableOperation<F>(F);

impl<F> Operation for TableOperation<F>
where
    F: Fn(Table) -> Result<Table> + Send + Sync,
{
    fn call(&self, args: &ArgMap) -> Result<Value> {
        let bytes = value::require_bytes(args, "table")?;
        let table = csv::parse(bytes).context("parse table argument")?;
        let out = (self.0)(table)?;
        Ok(Value::Bytes(csv::serialize(&out)?))
    }
}
