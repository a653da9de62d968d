//! Output-table axis metadata lookup.
//!
//! The CMOR tables describe each vertical axis a target variable can sit
//! on: its CF standard name and which discrete levels the table requests.
//! The engine only needs lookups, so the table store sits behind the
//! [`AxisRegistry`] trait; the CLI fills a [`MemoryAxisRegistry`] from its
//! manifest and tests construct one directly.

use std::collections::HashMap;

/// Which vertical levels a table requests for an axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LevelRequest {
    /// No explicit request; the full axis passes through.
    #[default]
    Unspecified,
    /// Every level present in the data.
    All,
    /// A list of discrete level values, spelled the way the table spells
    /// them (the spelling flows verbatim into the command string).
    Levels(Vec<String>),
    /// A single level value.
    Single(String),
}

impl LevelRequest {
    /// The requested level values, if any were named.
    pub fn values(&self) -> Vec<String> {
        match self {
            LevelRequest::Levels(levels) => levels.clone(),
            LevelRequest::Single(value) => vec![value.clone()],
            LevelRequest::All | LevelRequest::Unspecified => Vec::new(),
        }
    }
}

/// Metadata of one vertical axis in an output table.
#[derive(Debug, Clone, Default)]
pub struct AxisInfo {
    /// CF standard name, e.g. "air_pressure".
    pub standard_name: Option<String>,

    /// Levels the table requests on this axis.
    pub requested: LevelRequest,
}

/// Lookup of axis metadata per output table.
pub trait AxisRegistry: Send + Sync {
    /// Returns the metadata for `axis` in `table`, if the table defines
    /// such an axis.
    fn axis_info(&self, table: &str, axis: &str) -> Option<AxisInfo>;
}

/// In-memory registry keyed by (table, axis name).
#[derive(Debug, Default)]
pub struct MemoryAxisRegistry {
    axes: HashMap<(String, String), AxisInfo>,
}

impl MemoryAxisRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metadata for one axis of one table.
    pub fn insert(&mut self, table: impl Into<String>, axis: impl Into<String>, info: AxisInfo) {
        self.axes.insert((table.into(), axis.into()), info);
    }
}

impl AxisRegistry for MemoryAxisRegistry {
    fn axis_info(&self, table: &str, axis: &str) -> Option<AxisInfo> {
        self.axes.get(&(table.to_string(), axis.to_string())).cloned()
    }
}
