//! Settings for the post-processing engine.
//!
//! These are pure data types with no parsing or I/O logic; the CLI (or any
//! embedding application) fills them in and hands them to the engine.

use super::Size;
use std::fmt;
use std::str::FromStr;

/// Default number of worker threads executing command groups.
///
/// Values of 2 or below run groups serially in the caller's control flow.
pub const DEFAULT_TASK_THREADS: usize = 1;

/// Default number of threads handed to each CDO invocation (`-P`).
pub const DEFAULT_CDO_THREADS: usize = 4;

/// Default raw output frequency of the IFS model in hours.
///
/// Used to shift time stamps of aggregated fields back onto the interval
/// they describe.
pub const DEFAULT_OUTPUT_FREQUENCY_HOURS: u32 = 3;

/// Controls whether the external tool is actually invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Never invoke CDO; assume output files already exist.
    Skip,
    /// Invoke CDO only when the expected output file is missing.
    Append,
    /// Always invoke CDO, overwriting any previous output.
    #[default]
    Recreate,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionMode::Skip => "skip",
            ExecutionMode::Append => "append",
            ExecutionMode::Recreate => "recreate",
        };
        write!(f, "{}", s)
    }
}

/// Error parsing an [`ExecutionMode`] from a string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid execution mode '{0}' - expected 'skip', 'append' or 'recreate'")]
pub struct ExecutionModeParseError(String);

impl FromStr for ExecutionMode {
    type Err = ExecutionModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(ExecutionMode::Skip),
            "append" => Ok(ExecutionMode::Append),
            "recreate" => Ok(ExecutionMode::Recreate),
            _ => Err(ExecutionModeParseError(s.to_string())),
        }
    }
}

/// Configuration for one post-processing run.
#[derive(Debug, Clone)]
pub struct PostProcSettings {
    /// Execution mode (skip/append/recreate).
    pub mode: ExecutionMode,

    /// Worker threads consuming the command-group queue.
    ///
    /// `<= 2` executes groups serially; above that a fixed pool of this
    /// many workers drains the queue.
    pub task_threads: usize,

    /// Threads per CDO subprocess (`cdo -P`).
    pub cdo_threads: usize,

    /// Maximum cumulative size of produced output files.
    ///
    /// Once the accumulated size of finished outputs reaches this budget,
    /// no further command groups are launched. `None` means unlimited.
    pub max_size: Option<Size>,

    /// Raw IFS output frequency in hours, for time-shift corrections.
    pub output_frequency_hours: u32,
}

impl Default for PostProcSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            task_threads: DEFAULT_TASK_THREADS,
            cdo_threads: DEFAULT_CDO_THREADS,
            max_size: None,
            output_frequency_hours: DEFAULT_OUTPUT_FREQUENCY_HOURS,
        }
    }
}

impl PostProcSettings {
    /// Returns the byte budget, or `u64::MAX` when unlimited.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size.map(Size::bytes).unwrap_or(u64::MAX)
    }
}
