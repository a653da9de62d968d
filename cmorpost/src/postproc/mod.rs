//! The post-processing engine.
//!
//! For a batch of extraction tasks this module derives the minimal set of
//! distinct CDO pipelines, groups tasks sharing a pipeline, validates the
//! groupings, and executes each pipeline exactly once under a size budget.
//!
//! # Flow
//!
//! ```text
//! Vec<Arc<Task>> ──▶ CommandBuilder ──▶ Grouper ──▶ Validation ──▶ Executor
//!                    (one command       (dedup by    (uniform       (serial or
//!                     per task)          canonical    frequency)     worker pool)
//!                                        string)
//! ```
//!
//! # Key Components
//!
//! - [`PostProcessor`] - the engine facade; owns settings, runner, registry
//! - [`CommandBuilder`] - the frequency/operator/axis decision table
//! - [`CommandGroup`] - tasks sharing one deduplicated command
//! - [`PostProcError`] - per-task failure taxonomy

mod builder;
mod error;
mod executor;
mod grouping;

pub use builder::{CommandBuilder, GridDescription, InputGridType};
pub use error::PostProcError;
pub use executor::PostProcessor;
pub use grouping::{group_tasks, validate_group, CommandGroup};
