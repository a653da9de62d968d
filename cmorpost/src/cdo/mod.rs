//! CDO command model and subprocess invocation.
//!
//! A [`CdoCommand`] records one transformation pipeline as an ordered list
//! of operator invocations plus an optional leading field selector. The
//! command is a pure value: building it never touches the filesystem, and
//! two commands with the same operators serialize to the same canonical
//! string, which the engine uses as its deduplication key.
//!
//! Actually running a command goes through the [`CdoRunner`] trait, whose
//! production implementation ([`SystemCdo`]) shells out to the `cdo`
//! binary. Tests substitute a stub runner.

mod command;
mod operators;
mod runner;

pub use command::{CdoCommand, CdoOperator};
pub use operators::{ZAxisType, SURFACE_PRESSURE_CODE};
pub use runner::{CdoError, CdoRunner, SystemCdo};

/// Operator name constants, re-exported as a namespace.
pub mod op {
    pub use super::operators::*;
}
