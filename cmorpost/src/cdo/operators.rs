//! CDO operator vocabulary.
//!
//! Names match the spelling the `cdo` binary expects on its command line.

/// Select fields by GRIB code: `selcode,130`.
pub const SELECT_CODE: &str = "selcode";
/// Evaluate an arithmetic expression: `expr,'var91=var6+var7'`.
pub const EXPRESSION: &str = "expr";
/// Evaluate an expression, keeping the input fields: `aexpr,...`.
pub const ADD_EXPRESSION: &str = "aexpr";
/// Overwrite the GRIB code of the result: `setcode,91`.
pub const SET_CODE: &str = "setcode";
/// Transform spectral fields to a regular Gaussian grid: `sp2gpl`.
pub const SPECTRAL_TO_GRID: &str = "sp2gpl";
/// Remap to a named grid type: `setgridtype,regular`.
pub const SET_GRID_TYPE: &str = "setgridtype";
/// Argument to [`SET_GRID_TYPE`] for regular Gaussian output.
pub const REGULAR_GRID: &str = "regular";
/// Select time steps by hour of day: `selhour,0,6,12,18`.
pub const SELECT_HOUR: &str = "selhour";
/// Select time steps by day of month: `selday,15`.
pub const SELECT_DAY: &str = "selday";
/// Select time steps by month: `selmon,1`.
pub const SELECT_MONTH: &str = "selmon";
/// Select time steps by index: `seltimestep,1`.
pub const SELECT_TIMESTEP: &str = "seltimestep";
/// Shift all time stamps: `shifttime,-3hours`.
pub const SHIFT_TIME: &str = "shifttime";
/// Select a vertical axis by type: `selzaxis,pressure`.
pub const SELECT_Z_AXIS: &str = "selzaxis";
/// Select explicit vertical levels: `sellevel,85000,50000`.
pub const SELECT_LEVEL: &str = "sellevel";
/// Interpolate model levels to pressure levels: `ml2pl,85000,50000`.
pub const MODEL_TO_PRESSURE: &str = "ml2pl";

pub const DAILY_MEAN: &str = "daymean";
pub const DAILY_MAX: &str = "daymax";
pub const DAILY_MIN: &str = "daymin";
pub const MONTHLY_MEAN: &str = "monmean";
pub const MONTHLY_MAX: &str = "monmax";
pub const MONTHLY_MIN: &str = "monmin";

/// GRIB code of the IFS surface pressure field, needed as input for
/// model-to-pressure-level interpolation.
pub const SURFACE_PRESSURE_CODE: u32 = 134;

/// Vertical axis types distinguished by the post-processing.
///
/// The GRIB codes are the level-type indicators reported by
/// `cdo showltype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZAxisType {
    /// Surface fields (GRIB level type 1).
    Surface,
    /// Pressure levels (GRIB level type 100).
    Pressure,
    /// Height levels above ground (GRIB level type 105).
    Height,
    /// Hybrid model levels (GRIB level type 109).
    Hybrid,
}

impl ZAxisType {
    /// The axis name the `selzaxis` operator expects.
    pub fn cdo_name(self) -> &'static str {
        match self {
            ZAxisType::Surface => "surface",
            ZAxisType::Pressure => "pressure",
            ZAxisType::Height => "height",
            ZAxisType::Hybrid => "hybrid",
        }
    }

    /// The GRIB level-type indicator for this axis.
    pub fn grib_code(self) -> u32 {
        match self {
            ZAxisType::Surface => 1,
            ZAxisType::Pressure => 100,
            ZAxisType::Height => 105,
            ZAxisType::Hybrid => 109,
        }
    }

    /// Maps a GRIB level-type indicator back to an axis type.
    pub fn from_grib_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ZAxisType::Surface),
            100 => Some(ZAxisType::Pressure),
            105 => Some(ZAxisType::Height),
            109 => Some(ZAxisType::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for ZAxisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cdo_name())
    }
}
