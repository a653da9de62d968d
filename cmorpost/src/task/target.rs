//! CMOR target descriptors.
//!
//! A target names the standardized variable a task produces: its output
//! table, requested frequency, temporal reduction, and vertical axis.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested output frequency of a target variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Monthly,
    Daily,
    SixHourly,
    ThreeHourly,
    Hourly,
    /// A single fixed time step (time-invariant fields).
    Fixed,
}

/// Error parsing a [`Frequency`] from a CMIP frequency string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported frequency '{0}'")]
pub struct FrequencyParseError(String);

impl FromStr for Frequency {
    type Err = FrequencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mon" => Ok(Frequency::Monthly),
            "day" => Ok(Frequency::Daily),
            "6hr" | "6hrPt" => Ok(Frequency::SixHourly),
            "3hr" | "3hrPt" => Ok(Frequency::ThreeHourly),
            "1hr" | "1hrPt" => Ok(Frequency::Hourly),
            "fx" | "0" => Ok(Frequency::Fixed),
            other => Err(FrequencyParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Monthly => "mon",
            Frequency::Daily => "day",
            Frequency::SixHourly => "6hr",
            Frequency::ThreeHourly => "3hr",
            Frequency::Hourly => "1hr",
            Frequency::Fixed => "fx",
        };
        write!(f, "{}", s)
    }
}

/// Temporal reduction requested by the target's cell methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeOperator {
    Point,
    Mean,
    Maximum,
    Minimum,
    MaximumWithinDays,
    MinimumWithinDays,
    MeanOverDays,
    MeanWithinYears,
    MeanOverYears,
}

/// Error parsing a [`TimeOperator`] from a cell-methods fragment.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported time operator '{0}'")]
pub struct TimeOperatorParseError(String);

impl FromStr for TimeOperator {
    type Err = TimeOperatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "point" => Ok(TimeOperator::Point),
            "mean" => Ok(TimeOperator::Mean),
            "maximum" => Ok(TimeOperator::Maximum),
            "minimum" => Ok(TimeOperator::Minimum),
            "maximum within days" => Ok(TimeOperator::MaximumWithinDays),
            "minimum within days" => Ok(TimeOperator::MinimumWithinDays),
            "mean over days" => Ok(TimeOperator::MeanOverDays),
            "mean within years" => Ok(TimeOperator::MeanWithinYears),
            "mean over years" => Ok(TimeOperator::MeanOverYears),
            other => Err(TimeOperatorParseError(other.to_string())),
        }
    }
}

/// The target side of a task: one standardized output variable.
#[derive(Debug, Clone)]
pub struct Target {
    /// Standardized variable name, e.g. "tas".
    pub variable: String,

    /// Output table name, e.g. "Amon".
    pub table: String,

    /// Requested output frequency.
    pub frequency: Frequency,

    /// Temporal reductions from the table's cell methods. Defaults to an
    /// instantaneous snapshot.
    pub time_operators: Vec<TimeOperator>,

    /// Names of the target's vertical axes (at most one is supported).
    pub z_axes: Vec<String>,
}

impl Target {
    pub fn new(
        variable: impl Into<String>,
        table: impl Into<String>,
        frequency: Frequency,
    ) -> Self {
        Self {
            variable: variable.into(),
            table: table.into(),
            frequency,
            time_operators: vec![TimeOperator::Point],
            z_axes: Vec::new(),
        }
    }

    pub fn with_time_operators(mut self, operators: Vec<TimeOperator>) -> Self {
        self.time_operators = operators;
        self
    }

    pub fn with_z_axis(mut self, axis: impl Into<String>) -> Self {
        self.z_axes.push(axis.into());
        self
    }
}
