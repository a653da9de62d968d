//! Task model: one requested output variable and its lifecycle.
//!
//! A [`Task`] pairs an immutable source/target description with a small
//! amount of mutable runtime state: the file the next processing step
//! should read, the last CDO command applied, and a lifecycle status.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──▶ Processing ──▶ Done
//!    │             │
//!    └─────────────┴──▶ Failed   (terminal, irreversible)
//! ```
//!
//! Tasks are shared as `Arc<Task>` between the engine's command groups and
//! the caller; the runtime state sits behind a mutex so worker threads can
//! finalize a whole group without racing.

mod source;
mod target;

pub use source::{
    is_field_ref, referenced_codes, ExpressionError, IfsField, IfsGrid, ModelSource, NemoField,
};
pub use target::{
    Frequency, FrequencyParseError, Target, TimeOperator, TimeOperatorParseError,
};

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, no command applied yet.
    Pending,
    /// A command has been derived and recorded for this task.
    Processing,
    /// Post-processing finished; the task path points at the output.
    Done,
    /// Terminal failure; never leaves this state.
    Failed,
}

impl TaskStatus {
    pub fn is_failed(self) -> bool {
        matches!(self, TaskStatus::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

#[derive(Debug)]
struct TaskRuntime {
    status: TaskStatus,
    path: Option<PathBuf>,
    applied_command: Option<String>,
}

/// One requested standardized output variable.
pub struct Task {
    source: ModelSource,
    target: Target,
    input_paths: Vec<PathBuf>,
    runtime: Mutex<TaskRuntime>,
}

impl Task {
    /// Creates a task over the model files discovered for it.
    ///
    /// The task's current path starts at the first input file (the engine
    /// rejects tasks with more than one input; merging is unsupported).
    pub fn new(source: ModelSource, target: Target, input_paths: Vec<PathBuf>) -> Self {
        let path = input_paths.first().cloned();
        Self {
            source,
            target,
            input_paths,
            runtime: Mutex::new(TaskRuntime {
                status: TaskStatus::Pending,
                path,
                applied_command: None,
            }),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The files discovered for this task by the file-matching stage.
    pub fn input_paths(&self) -> &[PathBuf] {
        &self.input_paths
    }

    pub fn status(&self) -> TaskStatus {
        self.runtime.lock().unwrap().status
    }

    /// The file the next processing stage should read.
    pub fn path(&self) -> Option<PathBuf> {
        self.runtime.lock().unwrap().path.clone()
    }

    /// The canonical string of the last CDO command applied to this task.
    pub fn applied_command(&self) -> Option<String> {
        self.runtime.lock().unwrap().applied_command.clone()
    }

    /// Marks the task failed. Failure is terminal: later transitions are
    /// ignored.
    pub fn set_failed(&self) {
        self.runtime.lock().unwrap().status = TaskStatus::Failed;
    }

    /// Advances the lifecycle one step; no-op on terminal states.
    pub fn advance(&self) {
        let mut runtime = self.runtime.lock().unwrap();
        runtime.status = match runtime.status {
            TaskStatus::Pending => TaskStatus::Processing,
            TaskStatus::Processing => TaskStatus::Done,
            terminal => terminal,
        };
    }

    /// Records the command about to be applied, without changing state.
    pub fn record_command(&self, canonical: &str) {
        self.runtime.lock().unwrap().applied_command = Some(canonical.to_string());
    }

    /// Points the task at a new current file.
    pub fn set_path(&self, path: &Path) {
        self.runtime.lock().unwrap().path = Some(path.to_path_buf());
    }

    pub fn is_failed(&self) -> bool {
        self.status().is_failed()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let runtime = self.runtime.lock().unwrap();
        f.debug_struct("Task")
            .field("variable", &self.target.variable)
            .field("table", &self.target.table)
            .field("status", &runtime.status)
            .field("path", &runtime.path)
            .finish()
    }
}
