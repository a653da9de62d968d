//! Configuration types for the post-processing engine.
//!
//! All knobs live in explicit settings structs passed to the engine at
//! construction time; nothing is read from process-global state, so two
//! independently configured engines can run in one process.

mod settings;
mod size;

pub use settings::{
    ExecutionMode, ExecutionModeParseError, PostProcSettings, DEFAULT_CDO_THREADS,
    DEFAULT_OUTPUT_FREQUENCY_HOURS, DEFAULT_TASK_THREADS,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
