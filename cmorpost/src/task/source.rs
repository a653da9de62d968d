//! Model-field source descriptors.
//!
//! A source names the raw model output a task reads: either a single
//! GRIB-coded IFS field, or an arithmetic expression over several fields.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Matches a bare field reference such as `var134`.
pub fn field_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"var[0-9]{1,3}").unwrap())
}

/// True if the whole string is a single bare field reference.
pub fn is_field_ref(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^var[0-9]{1,3}$").unwrap())
        .is_match(s)
}

/// Extracts every referenced field code from an expression fragment, in
/// order of appearance, without duplicates.
pub fn referenced_codes(fragment: &str) -> Vec<u32> {
    let mut codes = Vec::new();
    for m in field_ref_regex().find_iter(fragment) {
        if let Ok(code) = m.as_str()[3..].parse::<u32>() {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
    }
    codes
}

/// Error building an expression-based source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("could not parse expression '{0}'")]
    Malformed(String),

    #[error("expression '{0}' references no input fields")]
    NoInputs(String),
}

/// Horizontal representation of an IFS field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfsGrid {
    /// Grid-point (reduced Gaussian) representation.
    GridPoint,
    /// Spherical-harmonics representation.
    Spectral,
}

/// One IFS field reference, possibly computed from other fields.
#[derive(Debug, Clone)]
pub struct IfsField {
    code: u32,
    grid: IfsGrid,
    spatial_dims: u8,
    expression: Option<String>,
    root_codes: Vec<u32>,
}

impl IfsField {
    /// A plain field identified by its GRIB code.
    pub fn from_code(code: u32, grid: IfsGrid, spatial_dims: u8) -> Self {
        Self {
            code,
            grid,
            spatial_dims,
            expression: None,
            root_codes: vec![code],
        }
    }

    /// A derived field computed by an expression of the form
    /// `varNNN = <arithmetic over varMMM references>`.
    ///
    /// The left-hand side names the output code; the root codes are every
    /// field referenced on the right-hand side.
    pub fn from_expression(
        expression: &str,
        grid: IfsGrid,
        spatial_dims: u8,
    ) -> Result<Self, ExpressionError> {
        let sides: Vec<&str> = expression.split('=').collect();
        if sides.len() != 2 {
            return Err(ExpressionError::Malformed(expression.to_string()));
        }
        let lhs = sides[0].trim();
        if !is_field_ref(lhs) {
            return Err(ExpressionError::Malformed(expression.to_string()));
        }
        let code: u32 = lhs[3..]
            .parse()
            .map_err(|_| ExpressionError::Malformed(expression.to_string()))?;
        let root_codes = referenced_codes(sides[1]);
        if root_codes.is_empty() {
            return Err(ExpressionError::NoInputs(expression.to_string()));
        }
        Ok(Self {
            code,
            grid,
            spatial_dims,
            expression: Some(expression.to_string()),
            root_codes,
        })
    }

    /// The GRIB code of the (possibly derived) field.
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn grid(&self) -> IfsGrid {
        self.grid
    }

    /// Number of spatial dimensions (2 for surface fields, 3 for fields
    /// on a vertical axis).
    pub fn spatial_dims(&self) -> u8 {
        self.spatial_dims
    }

    /// The defining expression, if this is a derived field.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// The raw input codes this field is computed from.
    pub fn root_codes(&self) -> &[u32] {
        &self.root_codes
    }
}

/// A NEMO ocean-model field reference.
///
/// Ocean output is already on its target grid and is cmorized without
/// CDO post-processing; the engine rejects tasks carrying these.
#[derive(Debug, Clone)]
pub struct NemoField {
    pub variable: String,
    pub grid: String,
}

/// The source side of a task.
#[derive(Debug, Clone)]
pub enum ModelSource {
    Ifs(IfsField),
    Nemo(NemoField),
}

impl ModelSource {
    /// The IFS field, if this is an atmosphere source.
    pub fn as_ifs(&self) -> Option<&IfsField> {
        match self {
            ModelSource::Ifs(field) => Some(field),
            ModelSource::Nemo(_) => None,
        }
    }
}
