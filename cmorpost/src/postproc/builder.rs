//! Derivation of CDO commands from tasks.
//!
//! One task maps to one command through four operator families, appended
//! in this order:
//!
//! 1. grid remapping (spectral transform or Gaussian regridding)
//! 2. expression evaluation and input-code selection
//! 3. temporal reduction, driven by a (frequency × operator) table
//! 4. vertical-level selection or interpolation
//!
//! Any failure marks the task as unbuildable: the caller records the
//! failure on the task and the task never reaches grouping or execution.

use super::error::PostProcError;
use crate::cdo::{op, CdoCommand, CdoRunner, ZAxisType, SURFACE_PRESSURE_CODE};
use crate::config::PostProcSettings;
use crate::schema::{AxisRegistry, LevelRequest};
use crate::task::{is_field_ref, referenced_codes, Frequency, IfsField, IfsGrid, Task, TimeOperator};
use std::path::Path;
use tracing::{error, warn};

/// Horizontal grid layout of the raw model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputGridType {
    /// Reduced Gaussian grid; needs remapping to a regular grid.
    #[default]
    GaussianReduced,
    /// Already regular; no remapping needed.
    Regular,
}

/// Description of the grid the grid-point output files are on.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridDescription {
    pub grid_type: InputGridType,
}

/// Derives the CDO command for one task.
pub struct CommandBuilder<'a> {
    settings: &'a PostProcSettings,
    runner: &'a dyn CdoRunner,
    registry: &'a dyn AxisRegistry,
    grid: GridDescription,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(
        settings: &'a PostProcSettings,
        runner: &'a dyn CdoRunner,
        registry: &'a dyn AxisRegistry,
        grid: GridDescription,
    ) -> Self {
        Self {
            settings,
            runner,
            registry,
            grid,
        }
    }

    /// Builds the full operator pipeline for `task`.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered; the caller is responsible
    /// for marking the task failed. No partially built command escapes.
    pub async fn build(&self, task: &Task) -> Result<CdoCommand, PostProcError> {
        let field = task
            .source()
            .as_ifs()
            .ok_or(PostProcError::NonIfsSource)?;
        if task.input_paths().len() > 1 {
            return Err(PostProcError::MergedInputs(task.input_paths().len()));
        }

        let mut command = if field.expression().is_some() {
            CdoCommand::new()
        } else {
            CdoCommand::for_code(field.code())
        };

        self.add_grid_operators(&mut command, field);
        self.add_expression_operators(&mut command, task, field)?;
        self.add_time_operators(&mut command, task)?;
        self.add_level_operators(&mut command, task, field).await?;
        Ok(command)
    }

    /// Grid remapping: spectral fields transform to grid points; reduced
    /// Gaussian grid-point fields regrid to a regular grid.
    fn add_grid_operators(&self, command: &mut CdoCommand, field: &IfsField) {
        match field.grid() {
            IfsGrid::Spectral => command.add_operator(op::SPECTRAL_TO_GRID),
            IfsGrid::GridPoint => {
                if self.grid.grid_type == InputGridType::GaussianReduced {
                    command.add_operator_with(op::SET_GRID_TYPE, [op::REGULAR_GRID]);
                }
            }
        }
    }

    /// Expression handling, including `merge(...)` per-level expressions.
    fn add_expression_operators(
        &self,
        command: &mut CdoCommand,
        task: &Task,
        field: &IfsField,
    ) -> Result<(), PostProcError> {
        let Some(expr) = field.expression() else {
            return Ok(());
        };
        let sides: Vec<&str> = expr.split('=').collect();
        if sides.len() != 2 || !is_field_ref(sides[0].trim()) {
            return Err(PostProcError::ExpressionParse(expr.to_string()));
        }
        let rhs = sides[1].trim();

        if let Some(arg) = rhs
            .strip_prefix("merge(")
            .and_then(|r| r.strip_suffix(')'))
        {
            let sub_exprs: Vec<&str> = arg.split(',').collect();
            if task.target().z_axes.is_empty() {
                // A per-level merge for a target without a vertical axis
                // cannot be represented; degrade to the first layer.
                warn!(
                    variable = %task.target().variable,
                    "Encountered merged per-level expression for variable with no z-axis: taking first field"
                );
                let sub = sub_exprs[0].trim();
                if !is_field_ref(sub) {
                    command.add_operator_with(
                        op::EXPRESSION,
                        [format!("var{}={}", field.code(), sub)],
                    );
                }
                command.add_operator_with(op::SELECT_CODE, referenced_codes(sub));
                return Ok(());
            }
            for sub in &sub_exprs {
                let sub = sub.trim();
                if is_field_ref(sub) {
                    continue;
                }
                let codes = referenced_codes(sub);
                if codes.len() != 1 {
                    error!(
                        expression = sub,
                        "Merging expressions of multiple variables per layer is not supported"
                    );
                    continue;
                }
                command.add_operator_with(op::ADD_EXPRESSION, [format!("var{}={}", codes[0], sub)]);
            }
            command.add_operator_with(op::SET_CODE, [field.code()]);
        } else {
            command.add_operator_with(op::EXPRESSION, [expr]);
        }
        command.add_operator_with(op::SELECT_CODE, field.root_codes().to_vec());
        Ok(())
    }

    /// Temporal reduction per the (frequency × operator) decision table.
    fn add_time_operators(
        &self,
        command: &mut CdoCommand,
        task: &Task,
    ) -> Result<(), PostProcError> {
        use TimeOperator::*;

        let target = task.target();
        let operators = target.time_operators.as_slice();
        let month = task.path().as_deref().and_then(month_suffix);
        let time_shift = format!("-{}hours", self.settings.output_frequency_hours);

        let unsupported = || PostProcError::UnsupportedTimeCombination {
            frequency: target.frequency,
            operators: target.time_operators.clone(),
        };

        match target.frequency {
            Frequency::Monthly => {
                match operators {
                    [Point] => {
                        // Representative mid-month snapshot
                        command.add_operator_with(op::SELECT_HOUR, [12]);
                        command.add_operator_with(op::SELECT_DAY, [15]);
                    }
                    [Mean] | [MeanWithinYears, MeanOverYears] => {
                        command.add_operator(op::MONTHLY_MEAN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [Maximum] => {
                        command.add_operator(op::MONTHLY_MAX);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [Minimum] => {
                        command.add_operator(op::MONTHLY_MIN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [MaximumWithinDays, MeanOverDays] => {
                        command.add_operator(op::DAILY_MAX);
                        command.add_operator(op::MONTHLY_MEAN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [MinimumWithinDays, MeanOverDays] => {
                        command.add_operator(op::DAILY_MIN);
                        command.add_operator(op::MONTHLY_MEAN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    _ => return Err(unsupported()),
                }
                if let Some(m) = month {
                    command.add_operator_with(op::SELECT_MONTH, [m]);
                }
            }
            Frequency::Daily => {
                match operators {
                    [Point] => command.add_operator_with(op::SELECT_HOUR, [12]),
                    [Mean] | [MeanWithinYears, MeanOverYears] => {
                        command.add_operator(op::DAILY_MEAN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [Maximum] => {
                        command.add_operator(op::DAILY_MAX);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    [Minimum] => {
                        command.add_operator(op::DAILY_MIN);
                        command.add_operator_with(op::SHIFT_TIME, [&time_shift]);
                    }
                    _ => return Err(unsupported()),
                }
                if let Some(m) = month {
                    command.add_operator_with(op::SELECT_MONTH, [m]);
                }
            }
            Frequency::SixHourly => match operators {
                [Point] => command.add_operator_with(op::SELECT_HOUR, [0, 6, 12, 18]),
                _ => return Err(unsupported()),
            },
            Frequency::ThreeHourly | Frequency::Hourly => match operators {
                // Already at the required cadence
                [Point] => {}
                _ => return Err(unsupported()),
            },
            Frequency::Fixed => match operators {
                [Point] | [Mean] => command.add_operator_with(op::SELECT_TIMESTEP, [1]),
                _ => return Err(unsupported()),
            },
        }
        Ok(())
    }

    /// Vertical-level selection or interpolation.
    async fn add_level_operators(
        &self,
        command: &mut CdoCommand,
        task: &Task,
        field: &IfsField,
    ) -> Result<(), PostProcError> {
        if field.spatial_dims() == 2 {
            return Ok(());
        }
        let target = task.target();
        match target.z_axes.as_slice() {
            [] => Ok(()),
            [axis_name] if axis_name == "alevel" => {
                command.add_operator_with(op::SELECT_Z_AXIS, [ZAxisType::Hybrid.cdo_name()]);
                Ok(())
            }
            [axis_name] if axis_name == "alevhalf" => {
                Err(PostProcError::HalfLevels(target.table.clone()))
            }
            [axis_name] => {
                let info = self
                    .registry
                    .axis_info(&target.table, axis_name)
                    .ok_or_else(|| PostProcError::UnknownAxis {
                        table: target.table.clone(),
                        axis: axis_name.clone(),
                    })?;

                // Without a concrete file the level types cannot be
                // queried; assume every interpolation source is present.
                let available = match task.path() {
                    Some(path) => {
                        self.runner
                            .z_axes(&path, field.root_codes()[0])
                            .await?
                    }
                    None => vec![ZAxisType::Hybrid, ZAxisType::Pressure, ZAxisType::Height],
                };

                let axis_type = match info.standard_name.as_deref() {
                    Some("air_pressure") => ZAxisType::Pressure,
                    Some("height") | Some("altitude") => ZAxisType::Height,
                    other => {
                        return Err(PostProcError::UnmappableAxis(
                            other.unwrap_or_default().to_string(),
                        ))
                    }
                };
                self.add_zaxis_operators(command, task, field, &available, &info.requested, axis_type)
                    .await
            }
            _ => Err(PostProcError::MultipleLevelAxes(target.table.clone())),
        }
    }

    /// Emits the level-type selector and level list for `axis_type`, or
    /// falls back to interpolation from model levels.
    async fn add_zaxis_operators(
        &self,
        command: &mut CdoCommand,
        task: &Task,
        field: &IfsField,
        available: &[ZAxisType],
        request: &LevelRequest,
        axis_type: ZAxisType,
    ) -> Result<(), PostProcError> {
        let requested = request.values();

        if !available.contains(&axis_type) && available.contains(&ZAxisType::Hybrid) {
            warn!(
                variable = %task.target().variable,
                axis = %axis_type,
                "Could not find requested levels, will interpolate from model levels"
            );
            command.add_operator_with(op::SELECT_CODE, [SURFACE_PRESSURE_CODE]);
            command.add_operator_with(
                op::SELECT_Z_AXIS,
                [ZAxisType::Hybrid.cdo_name(), ZAxisType::Surface.cdo_name()],
            );
            if !requested.is_empty() {
                command.add_operator_with(op::MODEL_TO_PRESSURE, requested);
            }
            return Ok(());
        }

        if !available.contains(&axis_type) {
            return Err(PostProcError::AxisUnavailable {
                axis: axis_type,
                variable: task.target().variable.clone(),
                available: available.to_vec(),
            });
        }

        if matches!(request, LevelRequest::All) {
            command.add_operator_with(op::SELECT_Z_AXIS, [axis_type.cdo_name()]);
            return Ok(());
        }
        if requested.is_empty() {
            return Ok(());
        }

        let numeric = requested
            .iter()
            .map(|s| {
                s.parse::<f64>()
                    .map_err(|_| PostProcError::LevelParse(s.clone()))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        // With a concrete input file, verify the requested levels exist.
        let present = match task.path() {
            Some(path) => {
                self.runner
                    .levels(&path, field.root_codes()[0], axis_type)
                    .await?
            }
            None => numeric.clone(),
        };
        let subset = numeric
            .iter()
            .all(|value| present.iter().any(|p| p == value));
        if !subset {
            return Err(PostProcError::LevelsUnavailable {
                axis: axis_type,
                variable: task.target().variable.clone(),
                requested,
                available: present,
            });
        }

        command.add_operator_with(op::SELECT_Z_AXIS, [axis_type.cdo_name()]);
        command.add_operator_with(op::SELECT_LEVEL, requested);
        Ok(())
    }
}

/// Extracts a 1-12 month number from a trailing two-digit path suffix
/// (IFS output files end in `+YYYYMM`).
fn month_suffix(path: &Path) -> Option<u32> {
    let s = path.to_str()?;
    let tail = s.get(s.len().checked_sub(2)?..)?;
    let month: u32 = tail.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdo::CdoError;
    use crate::schema::{AxisInfo, MemoryAxisRegistry};
    use crate::task::{ModelSource, NemoField, Target};
    use async_trait::async_trait;
    use std::path::PathBuf;

    /// Introspection stub: reports a fixed set of axes and levels and
    /// panics if asked to run a pipeline.
    struct FileStub {
        axes: Vec<ZAxisType>,
        levels: Vec<f64>,
    }

    impl Default for FileStub {
        fn default() -> Self {
            Self {
                axes: vec![ZAxisType::Hybrid, ZAxisType::Pressure, ZAxisType::Height],
                levels: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CdoRunner for FileStub {
        async fn apply(
            &self,
            _command: &CdoCommand,
            _input: &Path,
            _output: Option<&Path>,
            _threads: usize,
            _grib_first: bool,
        ) -> Result<PathBuf, CdoError> {
            panic!("builder must not execute commands");
        }

        async fn z_axes(&self, _path: &Path, _code: u32) -> Result<Vec<ZAxisType>, CdoError> {
            Ok(self.axes.clone())
        }

        async fn levels(
            &self,
            _path: &Path,
            _code: u32,
            _axis: ZAxisType,
        ) -> Result<Vec<f64>, CdoError> {
            Ok(self.levels.clone())
        }
    }

    fn settings() -> PostProcSettings {
        PostProcSettings::default()
    }

    fn ifs_task(code: u32, grid: IfsGrid, dims: u8, target: Target) -> Task {
        Task::new(
            ModelSource::Ifs(IfsField::from_code(code, grid, dims)),
            target,
            vec![PathBuf::from("/data/ICMGGECE3+199001")],
        )
    }

    async fn build(task: &Task) -> Result<CdoCommand, PostProcError> {
        build_with(task, &FileStub::default(), &MemoryAxisRegistry::new()).await
    }

    async fn build_with(
        task: &Task,
        runner: &dyn CdoRunner,
        registry: &dyn AxisRegistry,
    ) -> Result<CdoCommand, PostProcError> {
        let settings = settings();
        let builder = CommandBuilder::new(&settings, runner, registry, GridDescription::default());
        builder.build(task).await
    }

    #[tokio::test]
    async fn test_monthly_mean() {
        let target = Target::new("tas", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = ifs_task(167, IfsGrid::GridPoint, 2, target);

        let command = build(&task).await.unwrap();
        assert_eq!(
            command.canonical(),
            "-selmon,1 -shifttime,-3hours -monmean -setgridtype,regular -selcode,167"
        );
    }

    #[tokio::test]
    async fn test_monthly_point_snapshot() {
        let task = ifs_task(167, IfsGrid::GridPoint, 2, Target::new("tas", "Amon", Frequency::Monthly));

        let command = build(&task).await.unwrap();
        assert!(command.canonical().contains("-selhour,12"));
        assert!(command.canonical().contains("-selday,15"));
        assert!(!command.canonical().contains("monmean"));
    }

    #[tokio::test]
    async fn test_spectral_transform() {
        let target = Target::new("ta", "day", Frequency::Daily)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = ifs_task(130, IfsGrid::Spectral, 2, target);

        let command = build(&task).await.unwrap();
        assert!(command.canonical().contains("-sp2gpl"));
        assert!(!command.canonical().contains("setgridtype"));
        assert!(command.canonical().contains("-daymean"));
    }

    #[tokio::test]
    async fn test_monthly_max_within_days() {
        let target = Target::new("tasmax", "Amon", Frequency::Monthly).with_time_operators(vec![
            TimeOperator::MaximumWithinDays,
            TimeOperator::MeanOverDays,
        ]);
        let task = ifs_task(201, IfsGrid::GridPoint, 2, target);

        let command = build(&task).await.unwrap();
        // Daily max first, monthly mean after
        assert_eq!(
            command.canonical(),
            "-selmon,1 -shifttime,-3hours -monmean -daymax -setgridtype,regular -selcode,201"
        );
    }

    #[tokio::test]
    async fn test_six_hourly_point() {
        let target = Target::new("ta", "6hrPlevPt", Frequency::SixHourly);
        let task = ifs_task(130, IfsGrid::GridPoint, 2, target);

        let command = build(&task).await.unwrap();
        assert!(command.canonical().contains("-selhour,0,6,12,18"));
    }

    #[tokio::test]
    async fn test_three_hourly_point_is_noop() {
        let target = Target::new("pr", "3hr", Frequency::ThreeHourly);
        let task = ifs_task(228, IfsGrid::GridPoint, 2, target);

        let command = build(&task).await.unwrap();
        assert_eq!(command.canonical(), "-setgridtype,regular -selcode,228");
    }

    #[tokio::test]
    async fn test_fixed_frequency_selects_first_step() {
        let target = Target::new("orog", "fx", Frequency::Fixed);
        let task = ifs_task(129, IfsGrid::GridPoint, 2, target);

        let command = build(&task).await.unwrap();
        assert!(command.canonical().contains("-seltimestep,1"));
    }

    #[tokio::test]
    async fn test_unsupported_combination_fails() {
        let target = Target::new("ta", "6hrPlev", Frequency::SixHourly)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = ifs_task(130, IfsGrid::GridPoint, 2, target);

        let err = build(&task).await.unwrap_err();
        assert!(matches!(
            err,
            PostProcError::UnsupportedTimeCombination { .. }
        ));
    }

    #[tokio::test]
    async fn test_builder_is_idempotent() {
        let target = Target::new("tas", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = ifs_task(167, IfsGrid::GridPoint, 2, target);

        let first = build(&task).await.unwrap().canonical();
        let second = build(&task).await.unwrap().canonical();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_nemo_source_rejected() {
        let task = Task::new(
            ModelSource::Nemo(NemoField {
                variable: "tos".to_string(),
                grid: "grid_T".to_string(),
            }),
            Target::new("tos", "Omon", Frequency::Monthly),
            vec![PathBuf::from("/data/exp_1m_grid_T.nc")],
        );

        let err = build(&task).await.unwrap_err();
        assert!(matches!(err, PostProcError::NonIfsSource));
    }

    #[tokio::test]
    async fn test_multiple_inputs_rejected() {
        let task = Task::new(
            ModelSource::Ifs(IfsField::from_code(167, IfsGrid::GridPoint, 2)),
            Target::new("tas", "Amon", Frequency::Monthly),
            vec![
                PathBuf::from("/data/ICMGGECE3+199001"),
                PathBuf::from("/data/ICMSHECE3+199001"),
            ],
        );

        let err = build(&task).await.unwrap_err();
        assert!(matches!(err, PostProcError::MergedInputs(2)));
    }

    #[tokio::test]
    async fn test_expression_source() {
        let source = IfsField::from_expression("var91=var6+var7", IfsGrid::GridPoint, 2).unwrap();
        let target = Target::new("snw", "LImon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = Task::new(
            ModelSource::Ifs(source),
            target,
            vec![PathBuf::from("/data/ICMGGECE3+199001")],
        );

        let command = build(&task).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-expr,var91=var6+var7"));
        assert!(canonical.contains("-selcode,6,7"));
        // Expression sources carry no leading selector
        assert!(!canonical.contains("-selcode,91"));
    }

    #[tokio::test]
    async fn test_merge_expression_with_z_axis() {
        let source = IfsField::from_expression(
            "var23=merge(var1*var10,var2*var10)",
            IfsGrid::GridPoint,
            3,
        )
        .unwrap();
        let target = Target::new("mrsol", "Emon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("alevel");
        let task = Task::new(
            ModelSource::Ifs(source),
            target,
            vec![PathBuf::from("/data/ICMGGECE3+199001")],
        );

        let command = build(&task).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-aexpr,var1=var1*var10"));
        assert!(canonical.contains("-aexpr,var2=var2*var10"));
        assert!(canonical.contains("-setcode,23"));
        assert!(canonical.contains("-selcode,1,10,2"));
        assert!(command.needs_grib_intermediate());
    }

    #[tokio::test]
    async fn test_merge_expression_without_z_axis_takes_first_field() {
        let source = IfsField::from_expression(
            "var23=merge(var1*var10,var2*var10)",
            IfsGrid::GridPoint,
            2,
        )
        .unwrap();
        let target = Target::new("mrsos", "Lmon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean]);
        let task = Task::new(
            ModelSource::Ifs(source),
            target,
            vec![PathBuf::from("/data/ICMGGECE3+199001")],
        );

        let command = build(&task).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-expr,var23=var1*var10"));
        assert!(canonical.contains("-selcode,1,10"));
        assert!(!canonical.contains("var2*var10"));
        assert!(!command.needs_grib_intermediate());
    }

    #[tokio::test]
    async fn test_model_level_selection() {
        let target = Target::new("ta", "CFmon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("alevel");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let command = build(&task).await.unwrap();
        assert!(command.canonical().contains("-selzaxis,hybrid"));
    }

    #[tokio::test]
    async fn test_half_levels_rejected() {
        let target = Target::new("phalf", "CFmon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("alevhalf");
        let task = ifs_task(54, IfsGrid::Spectral, 3, target);

        let err = build(&task).await.unwrap_err();
        assert!(matches!(err, PostProcError::HalfLevels(_)));
    }

    #[tokio::test]
    async fn test_multiple_z_axes_rejected() {
        let target = Target::new("ta", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("plev19")
            .with_z_axis("alt40");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let err = build(&task).await.unwrap_err();
        assert!(matches!(err, PostProcError::MultipleLevelAxes(_)));
    }

    fn pressure_registry(levels: &[&str]) -> MemoryAxisRegistry {
        let mut registry = MemoryAxisRegistry::new();
        registry.insert(
            "Amon",
            "plev19",
            AxisInfo {
                standard_name: Some("air_pressure".to_string()),
                requested: LevelRequest::Levels(
                    levels.iter().map(|s| s.to_string()).collect(),
                ),
            },
        );
        registry
    }

    #[tokio::test]
    async fn test_pressure_levels_selected_when_present() {
        let registry = pressure_registry(&["85000", "50000"]);
        let stub = FileStub {
            axes: vec![ZAxisType::Hybrid, ZAxisType::Pressure],
            levels: vec![100000.0, 85000.0, 50000.0, 25000.0],
        };
        let target = Target::new("ta", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("plev19");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let command = build_with(&task, &stub, &registry).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-selzaxis,pressure"));
        assert!(canonical.contains("-sellevel,85000,50000"));
        assert!(!canonical.contains("ml2pl"));
    }

    #[tokio::test]
    async fn test_pressure_levels_interpolated_from_model_levels() {
        let registry = pressure_registry(&["85000", "50000"]);
        let stub = FileStub {
            axes: vec![ZAxisType::Hybrid, ZAxisType::Surface],
            levels: Vec::new(),
        };
        let target = Target::new("ta", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("plev19");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let command = build_with(&task, &stub, &registry).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-selcode,134"));
        assert!(canonical.contains("-selzaxis,hybrid,surface"));
        assert!(canonical.contains("-ml2pl,85000,50000"));
    }

    #[tokio::test]
    async fn test_missing_pressure_levels_fail() {
        let registry = pressure_registry(&["70000"]);
        let stub = FileStub {
            axes: vec![ZAxisType::Pressure],
            levels: vec![85000.0, 50000.0],
        };
        let target = Target::new("ta", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("plev19");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let err = build_with(&task, &stub, &registry).await.unwrap_err();
        match err {
            PostProcError::LevelsUnavailable {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, vec!["70000"]);
                assert_eq!(available, vec![85000.0, 50000.0]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_axis_fails() {
        let target = Target::new("ta", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("plev19");
        let task = ifs_task(130, IfsGrid::Spectral, 3, target);

        let err = build(&task).await.unwrap_err();
        assert!(matches!(err, PostProcError::UnknownAxis { .. }));
    }

    #[tokio::test]
    async fn test_unmappable_standard_name_fails() {
        let mut registry = MemoryAxisRegistry::new();
        registry.insert(
            "Amon",
            "sdepth",
            AxisInfo {
                standard_name: Some("depth".to_string()),
                requested: LevelRequest::Unspecified,
            },
        );
        let target = Target::new("tsl", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("sdepth");
        let task = ifs_task(139, IfsGrid::GridPoint, 3, target);

        let err = build_with(&task, &FileStub::default(), &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, PostProcError::UnmappableAxis(_)));
    }

    #[tokio::test]
    async fn test_height_single_value() {
        let mut registry = MemoryAxisRegistry::new();
        registry.insert(
            "Amon",
            "height2m",
            AxisInfo {
                standard_name: Some("height".to_string()),
                requested: LevelRequest::Single("2".to_string()),
            },
        );
        let stub = FileStub {
            axes: vec![ZAxisType::Height, ZAxisType::Surface],
            levels: vec![2.0, 10.0],
        };
        let target = Target::new("tas", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("height2m");
        let task = ifs_task(167, IfsGrid::GridPoint, 3, target);

        let command = build_with(&task, &stub, &registry).await.unwrap();
        let canonical = command.canonical();
        assert!(canonical.contains("-selzaxis,height"));
        assert!(canonical.contains("-sellevel,2"));
    }

    #[tokio::test]
    async fn test_two_dimensional_fields_skip_level_operators() {
        let target = Target::new("tas", "Amon", Frequency::Monthly)
            .with_time_operators(vec![TimeOperator::Mean])
            .with_z_axis("height2m");
        let task = ifs_task(167, IfsGrid::GridPoint, 2, target);

        // No registry entry needed: 2-D sources never reach the axis lookup
        let command = build(&task).await.unwrap();
        assert!(!command.canonical().contains("selzaxis"));
    }

    #[test]
    fn test_month_suffix() {
        assert_eq!(month_suffix(Path::new("/data/ICMGGECE3+199001")), Some(1));
        assert_eq!(month_suffix(Path::new("/data/ICMGGECE3+199012")), Some(12));
        assert_eq!(month_suffix(Path::new("/data/ICMGGECE3+199013")), None);
        assert_eq!(month_suffix(Path::new("/data/output.nc")), None);
        assert_eq!(month_suffix(Path::new("a")), None);
    }
}
