//! Error types for post-processing command derivation.

use crate::cdo::{CdoError, ZAxisType};
use crate::task::{Frequency, TimeOperator};
use thiserror::Error;

/// Failures while deriving or executing a post-processing command.
///
/// Every variant is local to one task (or one task group): the engine
/// marks the affected tasks failed and carries on with the rest of the
/// batch.
#[derive(Debug, Error)]
pub enum PostProcError {
    /// Only IFS atmosphere output is post-processed through CDO.
    #[error("post-processing commands can only be derived for IFS sources")]
    NonIfsSource,

    /// Merging several input files into one command is unsupported.
    #[error("tasks with multiple input files are not supported ({0} files found)")]
    MergedInputs(usize),

    /// The source expression does not match the `varNNN = ...` grammar.
    #[error("could not parse expression '{0}'")]
    ExpressionParse(String),

    /// The (frequency, time operators) pair is not in the decision table.
    #[error("unsupported combination of frequency {frequency} with time operators {operators:?}")]
    UnsupportedTimeCombination {
        frequency: Frequency,
        operators: Vec<TimeOperator>,
    },

    /// The target declares more than one vertical axis.
    #[error("multiple level dimensions in table {0} are not supported")]
    MultipleLevelAxes(String),

    /// Half-level output is not supported.
    #[error("vertical half-levels in table {0} are not supported")]
    HalfLevels(String),

    /// The output table defines no metadata for the named axis.
    #[error("no information for axis {axis} in table {table}")]
    UnknownAxis { table: String, axis: String },

    /// The axis standard name maps to no level selection.
    #[error("cannot map vertical axis standard name '{0}' to a level selection")]
    UnmappableAxis(String),

    /// A level value in the output table could not be parsed.
    #[error("could not parse requested level '{0}'")]
    LevelParse(String),

    /// The requested discrete levels are not all present in the file.
    #[error(
        "requested {axis} levels {requested:?} for {variable} not among available levels {available:?}"
    )]
    LevelsUnavailable {
        axis: ZAxisType,
        variable: String,
        requested: Vec<String>,
        available: Vec<f64>,
    },

    /// The file carries neither the requested axis nor model levels to
    /// interpolate from.
    #[error("could not retrieve {axis} levels for {variable}; file provides axes {available:?}")]
    AxisUnavailable {
        axis: ZAxisType,
        variable: String,
        available: Vec<ZAxisType>,
    },

    /// The group's input file is missing.
    #[error("task for {0} has no input file")]
    NoInputFile(String),

    /// External tool failure.
    #[error(transparent)]
    Tool(#[from] CdoError),
}
