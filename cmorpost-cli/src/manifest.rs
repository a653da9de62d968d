//! JSON task manifest.
//!
//! The manifest is the CLI's stand-in for the task-loading stage of the
//! full cmorization chain: it lists the requested output variables, their
//! source fields and input files, plus the axis metadata of the output
//! tables involved.
//!
//! ```json
//! {
//!   "grid": { "gridtype": "gaussian reduced" },
//!   "tables": {
//!     "Amon": {
//!       "plev19": { "standard_name": "air_pressure",
//!                   "requested": ["85000", "50000"] }
//!     }
//!   },
//!   "tasks": [
//!     { "variable": "tas", "table": "Amon", "frequency": "mon",
//!       "time_operators": ["mean"],
//!       "source": { "code": 167 },
//!       "paths": ["/data/ICMGGECE3+199001"] }
//!   ]
//! }
//! ```

use crate::error::CliError;
use cmorpost::postproc::{GridDescription, InputGridType};
use cmorpost::schema::{AxisInfo, LevelRequest, MemoryAxisRegistry};
use cmorpost::task::{IfsField, IfsGrid, ModelSource, Target, Task, TimeOperator};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    grid: Option<GridSpec>,
    #[serde(default)]
    tables: HashMap<String, HashMap<String, AxisSpec>>,
    tasks: Vec<TaskSpec>,
}

#[derive(Debug, Deserialize)]
struct GridSpec {
    gridtype: String,
}

#[derive(Debug, Deserialize)]
struct AxisSpec {
    #[serde(default)]
    standard_name: Option<String>,
    #[serde(default)]
    requested: Option<LevelsSpec>,
    #[serde(default)]
    value: Option<String>,
}

/// Level request: a list of values, or the keyword "all", or one value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LevelsSpec {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug, Deserialize)]
struct TaskSpec {
    variable: String,
    table: String,
    frequency: String,
    #[serde(default)]
    time_operators: Vec<String>,
    #[serde(default)]
    z_axes: Vec<String>,
    source: SourceSpec,
    #[serde(default)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SourceSpec {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    expression: Option<String>,
    /// "point" (default) or "spectral"
    #[serde(default)]
    grid: Option<String>,
    #[serde(default = "default_spatial_dims")]
    spatial_dims: u8,
}

fn default_spatial_dims() -> u8 {
    2
}

/// Everything the engine needs, converted out of one manifest file.
pub struct LoadedManifest {
    pub tasks: Vec<Arc<Task>>,
    pub registry: MemoryAxisRegistry,
    pub grid: GridDescription,
}

/// Reads and converts a manifest file.
pub fn load(path: &Path) -> Result<LoadedManifest, CliError> {
    let text = std::fs::read_to_string(path).map_err(|error| CliError::ManifestRead {
        path: path.display().to_string(),
        error,
    })?;
    let manifest: Manifest =
        serde_json::from_str(&text).map_err(|e| CliError::Manifest(e.to_string()))?;
    convert(manifest)
}

fn convert(manifest: Manifest) -> Result<LoadedManifest, CliError> {
    let grid = match manifest.grid {
        Some(spec) => GridDescription {
            grid_type: match spec.gridtype.as_str() {
                "gaussian reduced" => InputGridType::GaussianReduced,
                "regular" => InputGridType::Regular,
                other => {
                    return Err(CliError::Manifest(format!(
                        "unknown gridtype '{}'",
                        other
                    )))
                }
            },
        },
        None => GridDescription::default(),
    };

    let mut registry = MemoryAxisRegistry::new();
    for (table, axes) in manifest.tables {
        for (axis, spec) in axes {
            registry.insert(&table, &axis, axis_info(spec));
        }
    }

    let mut tasks = Vec::with_capacity(manifest.tasks.len());
    for spec in manifest.tasks {
        tasks.push(Arc::new(convert_task(spec)?));
    }

    Ok(LoadedManifest {
        tasks,
        registry,
        grid,
    })
}

fn axis_info(spec: AxisSpec) -> AxisInfo {
    let requested = match (spec.requested, spec.value) {
        (Some(LevelsSpec::One(s)), _) if s == "all" => LevelRequest::All,
        (Some(LevelsSpec::One(s)), _) => LevelRequest::Single(s),
        (Some(LevelsSpec::Many(levels)), _) => LevelRequest::Levels(levels),
        (None, Some(value)) => LevelRequest::Single(value),
        (None, None) => LevelRequest::Unspecified,
    };
    AxisInfo {
        standard_name: spec.standard_name,
        requested,
    }
}

fn convert_task(spec: TaskSpec) -> Result<Task, CliError> {
    let grid = match spec.source.grid.as_deref() {
        None | Some("point") => IfsGrid::GridPoint,
        Some("spectral") => IfsGrid::Spectral,
        Some(other) => {
            return Err(CliError::Manifest(format!(
                "unknown source grid '{}' for {}",
                other, spec.variable
            )))
        }
    };
    let field = match (spec.source.code, spec.source.expression) {
        (Some(code), None) => IfsField::from_code(code, grid, spec.source.spatial_dims),
        (None, Some(expression)) => {
            IfsField::from_expression(&expression, grid, spec.source.spatial_dims)
                .map_err(|e| CliError::Manifest(e.to_string()))?
        }
        _ => {
            return Err(CliError::Manifest(format!(
                "source of {} needs exactly one of 'code' or 'expression'",
                spec.variable
            )))
        }
    };

    let frequency = spec
        .frequency
        .parse()
        .map_err(|e: cmorpost::task::FrequencyParseError| CliError::Manifest(e.to_string()))?;
    let mut target = Target::new(spec.variable, spec.table, frequency);
    if !spec.time_operators.is_empty() {
        let operators = spec
            .time_operators
            .iter()
            .map(|s| s.parse::<TimeOperator>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CliError::Manifest(e.to_string()))?;
        target = target.with_time_operators(operators);
    }
    for axis in spec.z_axes {
        target = target.with_z_axis(axis);
    }

    Ok(Task::new(ModelSource::Ifs(field), target, spec.paths))
}
