//! The CDO pipeline value type.

use super::operators as op;

/// One operator invocation: a name plus its comma-joined arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CdoOperator {
    name: String,
    args: Vec<String>,
}

impl CdoOperator {
    fn new(name: &str, args: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }

    /// Renders the operator the way it appears in a CDO chain, e.g.
    /// `-selhour,0,6,12,18`.
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            format!("-{}", self.name)
        } else {
            format!("-{},{}", self.name, self.args.join(","))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered CDO operator pipeline plus an optional leading field selector.
///
/// Operators are applied in append order. CDO itself evaluates a chain
/// right-to-left, so rendering reverses the recorded sequence; the field
/// selector, when present, is always applied first (rightmost).
///
/// Two commands with identical operator sequences and selector compare
/// equal, hash equal, and serialize to byte-identical canonical strings;
/// the engine relies on this for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CdoCommand {
    selector: Option<u32>,
    operators: Vec<CdoOperator>,
}

impl CdoCommand {
    /// A command with no field selector (expression sources select their
    /// own input codes).
    pub fn new() -> Self {
        Self::default()
    }

    /// A command selecting a single GRIB code from the input.
    pub fn for_code(code: u32) -> Self {
        Self {
            selector: Some(code),
            operators: Vec::new(),
        }
    }

    /// Appends an operator without arguments.
    pub fn add_operator(&mut self, name: &str) {
        self.operators.push(CdoOperator::new(name, Vec::new()));
    }

    /// Appends an operator with arguments.
    ///
    /// Arguments are recorded verbatim in order; numeric arguments use
    /// their `Display` spelling.
    pub fn add_operator_with<I>(&mut self, name: &str, args: I)
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let args = args.into_iter().map(|a| a.to_string()).collect();
        self.operators.push(CdoOperator::new(name, args));
    }

    /// True if any recorded operator has the given name.
    pub fn has_operator(&self, name: &str) -> bool {
        self.operators.iter().any(|o| o.name == name)
    }

    /// True if the command needs a GRIB intermediate before NetCDF
    /// conversion (merged per-level expressions rewrite the field code,
    /// which only works on the GRIB representation).
    pub fn needs_grib_intermediate(&self) -> bool {
        self.has_operator(op::SET_CODE)
    }

    /// The pipeline as individual command-line arguments, in the order the
    /// `cdo` binary expects them (last appended operator first, selector
    /// last).
    pub fn pipeline_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.operators.iter().rev().map(CdoOperator::render).collect();
        if let Some(code) = self.selector {
            args.push(format!("-{},{}", op::SELECT_CODE, code));
        }
        args
    }

    /// Deterministic canonical serialization, used as the deduplication
    /// key: equal pipelines produce byte-identical strings.
    pub fn canonical(&self) -> String {
        self.pipeline_args().join(" ")
    }

    /// Number of recorded operators (selector excluded).
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl std::fmt::Display for CdoCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
