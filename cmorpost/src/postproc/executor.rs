//! Scheduling and execution of deduplicated command groups.
//!
//! # Architecture
//!
//! ```text
//! tasks ──▶ CommandBuilder ──▶ group_tasks ──▶ validate ──▶ execute
//!                │                                             │
//!                └── failed tasks drop out ◀───────────────────┘
//! ```
//!
//! Execution runs each distinct command exactly once. With a small
//! thread setting groups run serially in the caller's control flow;
//! above that a fixed pool of workers drains a shared queue. Either way
//! a synchronized ledger accumulates the size of produced outputs and
//! stops new groups from launching once the configured budget is spent.
//! In-flight subprocesses are never killed.

use super::builder::{CommandBuilder, GridDescription};
use super::grouping::{group_tasks, validate_group, CommandGroup};
use crate::cdo::CdoRunner;
use crate::config::{ExecutionMode, PostProcSettings};
use crate::schema::AxisRegistry;
use crate::task::Task;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Shared accounting of executed groups: accumulated output bytes plus
/// the tasks handed through execution (successful or failed).
#[derive(Debug, Default)]
struct ExecutionLedger {
    bytes: u64,
    finished: Vec<Arc<Task>>,
}

impl ExecutionLedger {
    fn record(&mut self, produced: Option<&Path>, tasks: Vec<Arc<Task>>) {
        if let Some(path) = produced {
            if let Ok(meta) = std::fs::metadata(path) {
                self.bytes += meta.len();
            }
        }
        self.finished.extend(tasks);
    }
}

/// The post-processing engine facade.
///
/// Owns the run configuration, the external-tool runner and the
/// output-table registry; [`post_process`](Self::post_process) is the
/// single entry point.
pub struct PostProcessor {
    settings: PostProcSettings,
    runner: Arc<dyn CdoRunner>,
    registry: Arc<dyn AxisRegistry>,
}

impl PostProcessor {
    pub fn new(
        settings: PostProcSettings,
        runner: Arc<dyn CdoRunner>,
        registry: Arc<dyn AxisRegistry>,
    ) -> Self {
        Self {
            settings,
            runner,
            registry,
        }
    }

    /// Post-processes a batch of tasks.
    ///
    /// Derives one command per task, deduplicates identical commands,
    /// validates the groupings and executes each surviving group once.
    /// Returns the tasks that went through execution and did not fail;
    /// failed tasks (and groups skipped over budget) are left behind in
    /// their respective states.
    pub async fn post_process(
        &self,
        tasks: &[Arc<Task>],
        output_dir: Option<&Path>,
        grid: GridDescription,
    ) -> Vec<Arc<Task>> {
        let builder = CommandBuilder::new(
            &self.settings,
            self.runner.as_ref(),
            self.registry.as_ref(),
            grid,
        );

        let mut planned = Vec::with_capacity(tasks.len());
        for task in tasks {
            match builder.build(task).await {
                Ok(command) => planned.push((Arc::clone(task), command)),
                Err(err) => {
                    error!(
                        variable = %task.target().variable,
                        table = %task.target().table,
                        error = %err,
                        "No post-processing command could be derived"
                    );
                    task.set_failed();
                }
            }
        }

        let mut groups = Vec::new();
        for group in group_tasks(planned) {
            if validate_group(&group) {
                groups.push(group);
            } else {
                fail_group(&group);
            }
        }

        info!(
            groups = groups.len(),
            mode = %self.settings.mode,
            workers = self.settings.task_threads,
            "Executing post-processing command groups"
        );

        let ledger = if self.settings.task_threads <= 2 {
            self.run_serial(groups, output_dir).await
        } else {
            self.run_pooled(groups, output_dir).await
        };

        ledger
            .finished
            .into_iter()
            .filter(|task| !task.is_failed())
            .collect()
    }

    async fn run_serial(
        &self,
        groups: Vec<CommandGroup>,
        output_dir: Option<&Path>,
    ) -> ExecutionLedger {
        let budget = self.settings.max_size_bytes();
        let mut ledger = ExecutionLedger::default();
        for group in groups {
            if ledger.bytes >= budget {
                warn!(
                    spent = ledger.bytes,
                    budget, "Output size budget reached; not launching further command groups"
                );
                break;
            }
            let produced =
                apply_group(&self.settings, self.runner.as_ref(), &group, output_dir).await;
            ledger.record(produced.as_deref(), group.tasks);
        }
        ledger
    }

    async fn run_pooled(
        &self,
        groups: Vec<CommandGroup>,
        output_dir: Option<&Path>,
    ) -> ExecutionLedger {
        let budget = self.settings.max_size_bytes();
        let queue = Arc::new(Mutex::new(VecDeque::from(groups)));
        let ledger = Arc::new(Mutex::new(ExecutionLedger::default()));

        let mut workers = Vec::with_capacity(self.settings.task_threads);
        for worker in 0..self.settings.task_threads {
            let queue = Arc::clone(&queue);
            let ledger = Arc::clone(&ledger);
            let settings = self.settings.clone();
            let runner = Arc::clone(&self.runner);
            let output_dir = output_dir.map(Path::to_path_buf);

            workers.push(tokio::spawn(async move {
                loop {
                    let group = queue.lock().unwrap().pop_front();
                    let Some(group) = group else { break };

                    // Budget check happens per dequeue against everything
                    // finished so far, on the same lock the recording uses.
                    let spent = ledger.lock().unwrap().bytes;
                    if spent >= budget {
                        debug!(worker, spent, budget, "Budget spent; dropping queued command group");
                        continue;
                    }

                    let produced = apply_group(
                        &settings,
                        runner.as_ref(),
                        &group,
                        output_dir.as_deref(),
                    )
                    .await;
                    ledger
                        .lock()
                        .unwrap()
                        .record(produced.as_deref(), group.tasks);
                }
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        match Arc::try_unwrap(ledger) {
            Ok(inner) => inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            // Unreachable after joining every worker, but don't panic over it.
            Err(shared) => std::mem::take(&mut *shared.lock().unwrap()),
        }
    }
}

fn fail_group(group: &CommandGroup) {
    for task in &group.tasks {
        task.set_failed();
    }
}

/// Executes one command group and finalizes its tasks as a unit.
///
/// Returns the path of the (possibly pre-existing) output file, or `None`
/// when nothing was produced. On tool failure every member task is marked
/// failed; no retry happens here.
async fn apply_group(
    settings: &PostProcSettings,
    runner: &dyn CdoRunner,
    group: &CommandGroup,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if group.tasks.is_empty() {
        warn!(command = %group.command, "Encountered empty task list for post-processing command");
        return None;
    }
    if output_dir.is_none()
        && matches!(settings.mode, ExecutionMode::Skip | ExecutionMode::Append)
    {
        warn!("Running in skip/append mode without an output directory; no existing output can be reused");
    }

    let first = &group.tasks[0];
    let Some(input) = first.path() else {
        error!(variable = %first.target().variable, "Task group has no input file");
        fail_group(group);
        return None;
    };

    let out_name = format!("{}_{}.nc", first.target().variable, first.target().table);
    let expected = output_dir.map(|dir| dir.join(&out_name));
    let canonical = group.command.canonical();

    for task in &group.tasks {
        info!(
            variable = %task.target().variable,
            table = %task.target().table,
            input = %input.display(),
            command = %canonical,
            "Post-processing target"
        );
        task.record_command(&canonical);
        task.advance();
    }

    let invoke = match settings.mode {
        ExecutionMode::Skip => false,
        ExecutionMode::Recreate => true,
        ExecutionMode::Append => !expected.as_ref().is_some_and(|path| path.exists()),
    };

    let mut result = expected.clone();
    if invoke {
        let grib_first = group.command.needs_grib_intermediate();
        match runner
            .apply(
                &group.command,
                &input,
                expected.as_deref(),
                settings.cdo_threads,
                grib_first,
            )
            .await
        {
            Ok(path) => {
                if expected.is_none() {
                    // The tool picked a temporary location; move the file
                    // onto its deterministic name in the same directory.
                    match path.parent().map(|dir| dir.join(&out_name)) {
                        Some(target) => match std::fs::rename(&path, &target) {
                            Ok(()) => result = Some(target),
                            Err(err) => {
                                error!(
                                    from = %path.display(),
                                    to = %target.display(),
                                    error = %err,
                                    "Could not move tool output into place"
                                );
                                fail_group(group);
                                return None;
                            }
                        },
                        None => result = Some(path),
                    }
                } else {
                    result = Some(path);
                }
            }
            Err(err) => {
                error!(command = %canonical, error = %err, "Post-processing command failed");
                fail_group(group);
                return None;
            }
        }
    }

    for task in &group.tasks {
        if !task.is_failed() {
            if let Some(path) = &result {
                task.set_path(path);
            }
            task.advance();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdo::{CdoCommand, CdoError, ZAxisType};
    use crate::schema::MemoryAxisRegistry;
    use crate::task::{Frequency, IfsField, IfsGrid, ModelSource, Target, TaskStatus, TimeOperator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner stub that fabricates output files of a fixed size and
    /// counts invocations.
    struct RecordingRunner {
        invocations: AtomicUsize,
        output_size: usize,
        fail: bool,
    }

    impl RecordingRunner {
        fn new(output_size: usize) -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                output_size,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                output_size: 0,
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CdoRunner for RecordingRunner {
        async fn apply(
            &self,
            _command: &CdoCommand,
            _input: &Path,
            output: Option<&Path>,
            _threads: usize,
            _grib_first: bool,
        ) -> Result<PathBuf, CdoError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CdoError::Failed {
                    status: 1,
                    stderr: "boom".to_string(),
                });
            }
            let path = match output {
                Some(p) => p.to_path_buf(),
                None => tempfile::Builder::new()
                    .prefix("cmorpost_test_")
                    .suffix(".nc")
                    .tempfile()
                    .unwrap()
                    .keep()
                    .unwrap()
                    .1,
            };
            std::fs::write(&path, vec![0u8; self.output_size]).unwrap();
            Ok(path)
        }

        async fn z_axes(&self, _path: &Path, _code: u32) -> Result<Vec<ZAxisType>, CdoError> {
            Ok(vec![ZAxisType::Surface])
        }

        async fn levels(
            &self,
            _path: &Path,
            _code: u32,
            _axis: ZAxisType,
        ) -> Result<Vec<f64>, CdoError> {
            Ok(Vec::new())
        }
    }

    fn monthly_task(variable: &str, code: u32, input: &Path) -> Arc<Task> {
        Arc::new(Task::new(
            ModelSource::Ifs(IfsField::from_code(code, IfsGrid::GridPoint, 2)),
            Target::new(variable, "Amon", Frequency::Monthly)
                .with_time_operators(vec![TimeOperator::Mean]),
            vec![input.to_path_buf()],
        ))
    }

    fn engine(settings: PostProcSettings, runner: Arc<RecordingRunner>) -> PostProcessor {
        PostProcessor::new(settings, runner, Arc::new(MemoryAxisRegistry::new()))
    }

    fn input_file(dir: &Path) -> PathBuf {
        let input = dir.join("ICMGGECE3+199001");
        std::fs::write(&input, b"raw model output").unwrap();
        input
    }

    #[tokio::test]
    async fn test_shared_command_invoked_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(64));
        let engine = engine(PostProcSettings::default(), Arc::clone(&runner));

        // Same code, same target semantics: identical commands
        let tasks = vec![
            monthly_task("tas", 167, &input),
            monthly_task("tas", 167, &input),
        ];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 1);
        assert_eq!(finished.len(), 2);
        for task in &finished {
            assert_eq!(task.status(), TaskStatus::Done);
            assert_eq!(task.path(), Some(dir.path().join("tas_Amon.nc")));
            assert!(task.applied_command().is_some());
        }
    }

    #[tokio::test]
    async fn test_distinct_commands_invoked_separately() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(64));
        let engine = engine(PostProcSettings::default(), Arc::clone(&runner));

        let tasks = vec![
            monthly_task("tas", 167, &input),
            monthly_task("uas", 165, &input),
        ];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 2);
        assert_eq!(finished.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_mode_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(64));
        let settings = PostProcSettings {
            mode: ExecutionMode::Skip,
            ..Default::default()
        };
        let engine = engine(settings, Arc::clone(&runner));

        let tasks = vec![monthly_task("tas", 167, &input)];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 0);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status(), TaskStatus::Done);
        // Skip mode trusts the pre-existing output path
        assert_eq!(finished[0].path(), Some(dir.path().join("tas_Amon.nc")));
    }

    #[tokio::test]
    async fn test_append_mode_reuses_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        std::fs::write(dir.path().join("tas_Amon.nc"), b"already there").unwrap();

        let runner = Arc::new(RecordingRunner::new(64));
        let settings = PostProcSettings {
            mode: ExecutionMode::Append,
            ..Default::default()
        };
        let engine = engine(settings, Arc::clone(&runner));

        let tasks = vec![monthly_task("tas", 167, &input)];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 0);
        assert_eq!(finished[0].status(), TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_append_mode_creates_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(64));
        let settings = PostProcSettings {
            mode: ExecutionMode::Append,
            ..Default::default()
        };
        let engine = engine(settings, Arc::clone(&runner));

        let tasks = vec![monthly_task("tas", 167, &input)];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 1);
        assert_eq!(finished.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_fails_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::failing());
        let engine = engine(PostProcSettings::default(), Arc::clone(&runner));

        let tasks = vec![
            monthly_task("tas", 167, &input),
            monthly_task("tas", 167, &input),
        ];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 1);
        assert!(finished.is_empty());
        for task in &tasks {
            assert_eq!(task.status(), TaskStatus::Failed);
        }
    }

    #[tokio::test]
    async fn test_serial_budget_stops_new_groups() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        // Each group produces 600 bytes; budget of 1KB admits two groups
        // (the check runs before launch, the accounting after).
        let runner = Arc::new(RecordingRunner::new(600));
        let settings = PostProcSettings {
            max_size: Some(crate::config::Size(1024)),
            ..Default::default()
        };
        let engine = engine(settings, Arc::clone(&runner));

        let tasks = vec![
            monthly_task("tas", 167, &input),
            monthly_task("uas", 165, &input),
            monthly_task("vas", 166, &input),
        ];
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 2);
        assert_eq!(finished.len(), 2);
        // The third task never entered execution
        let pending: Vec<_> = tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_pooled_execution_processes_every_group_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(16));
        let settings = PostProcSettings {
            task_threads: 4,
            ..Default::default()
        };
        let engine = engine(settings, Arc::clone(&runner));

        let tasks: Vec<_> = (0u32..8)
            .map(|i| monthly_task(&format!("var{i}"), 150 + i, &input))
            .collect();
        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 8);
        assert_eq!(finished.len(), 8);
    }

    #[tokio::test]
    async fn test_mixed_frequency_group_never_executes() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(dir.path());
        let runner = Arc::new(RecordingRunner::new(64));
        let engine = engine(PostProcSettings::default(), Arc::clone(&runner));

        // 1-hourly and 3-hourly point extraction are both time no-ops, so
        // the two targets collapse onto one command despite their
        // different output frequencies.
        let three_hourly = Arc::new(Task::new(
            ModelSource::Ifs(IfsField::from_code(228, IfsGrid::GridPoint, 2)),
            Target::new("pr", "3hr", Frequency::ThreeHourly),
            vec![input.clone()],
        ));
        let hourly = Arc::new(Task::new(
            ModelSource::Ifs(IfsField::from_code(228, IfsGrid::GridPoint, 2)),
            Target::new("pr", "1hr", Frequency::Hourly),
            vec![input.clone()],
        ));
        let tasks = vec![three_hourly, hourly];

        let finished = engine
            .post_process(&tasks, Some(dir.path()), GridDescription::default())
            .await;

        assert_eq!(runner.count(), 0);
        assert!(finished.is_empty());
        for task in &tasks {
            assert_eq!(task.status(), TaskStatus::Failed);
        }
    }
}
