//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid command-line option value
    Option { option: String, message: String },
    /// Failed to read the task manifest
    ManifestRead { path: String, error: std::io::Error },
    /// Manifest contents are invalid
    Manifest(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Manifest(_) = self {
            eprintln!();
            eprintln!("The manifest is a JSON file with a \"tasks\" list; each task names");
            eprintln!("its variable, table, frequency, source field and input files.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Option { option, message } => {
                write!(f, "Invalid value for {}: {}", option, message)
            }
            CliError::ManifestRead { path, error } => {
                write!(f, "Failed to read manifest '{}': {}", path, error)
            }
            CliError::Manifest(msg) => write!(f, "Invalid manifest: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ManifestRead { error, .. } => Some(error),
            _ => None,
        }
    }
}
