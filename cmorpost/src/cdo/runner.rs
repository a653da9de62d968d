//! Invocation of the external `cdo` binary.
//!
//! [`CdoRunner`] is the single seam between the engine and the outside
//! world: applying a pipeline to an input file, and the two introspection
//! queries used to discover which vertical axes and levels a file actually
//! contains. The production implementation spawns subprocesses; tests
//! implement the trait with a stub.

use super::command::CdoCommand;
use super::operators::ZAxisType;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use thiserror::Error;
use tracing::debug;

/// Errors from external tool invocations.
#[derive(Debug, Error)]
pub enum CdoError {
    /// The subprocess exited with a nonzero status.
    #[error("cdo exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    /// The subprocess reported success but the output file is missing.
    #[error("cdo produced no output file at {0}")]
    MissingOutput(PathBuf),

    /// Introspection output could not be parsed.
    #[error("could not parse cdo output: '{0}'")]
    Parse(String),

    /// Failed to spawn or talk to the subprocess.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Interface to the external transformation tool.
#[async_trait]
pub trait CdoRunner: Send + Sync {
    /// Applies the command to `input`, producing `output`.
    ///
    /// When `output` is `None` the runner picks a temporary location and
    /// returns it; the caller renames the file into place. `threads` is
    /// passed through to the tool's own parallelism flag. With
    /// `grib_first` the pipeline is applied on the GRIB representation
    /// first and converted to NetCDF in a second step.
    ///
    /// # Errors
    ///
    /// Fails on nonzero exit status or when the expected output file does
    /// not exist afterwards.
    async fn apply(
        &self,
        command: &CdoCommand,
        input: &Path,
        output: Option<&Path>,
        threads: usize,
        grib_first: bool,
    ) -> Result<PathBuf, CdoError>;

    /// Queries which vertical axis types exist for the given GRIB code in
    /// the file.
    async fn z_axes(&self, path: &Path, code: u32) -> Result<Vec<ZAxisType>, CdoError>;

    /// Queries the level values present for the given GRIB code on the
    /// given axis type.
    async fn levels(
        &self,
        path: &Path,
        code: u32,
        axis: ZAxisType,
    ) -> Result<Vec<f64>, CdoError>;
}

/// Production runner shelling out to the `cdo` binary.
#[derive(Debug, Clone)]
pub struct SystemCdo {
    binary: PathBuf,
}

impl SystemCdo {
    /// A runner using `cdo` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("cdo"),
        }
    }

    /// A runner using an explicit binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output, CdoError> {
        debug!(binary = %self.binary.display(), args = ?args, "Invoking cdo");
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(CdoError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    fn temp_output(prefix: &str, suffix: &str) -> Result<PathBuf, CdoError> {
        let (_, path) = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()?
            .keep()
            .map_err(|e| CdoError::Io(e.error))?;
        Ok(path)
    }
}

impl Default for SystemCdo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdoRunner for SystemCdo {
    async fn apply(
        &self,
        command: &CdoCommand,
        input: &Path,
        output: Option<&Path>,
        threads: usize,
        grib_first: bool,
    ) -> Result<PathBuf, CdoError> {
        let out_path = match output {
            Some(p) => p.to_path_buf(),
            None => Self::temp_output("cmorpost_", ".nc")?,
        };

        if grib_first {
            // Stage 1: run the pipeline on the GRIB representation.
            let grib_path = Self::temp_output("cmorpost_", ".grb")?;
            let mut args = vec!["-P".to_string(), threads.to_string()];
            args.extend(command.pipeline_args());
            args.push(input.display().to_string());
            args.push(grib_path.display().to_string());
            self.run(&args).await?;

            // Stage 2: convert the intermediate to NetCDF.
            let args = vec![
                "-f".to_string(),
                "nc".to_string(),
                "copy".to_string(),
                grib_path.display().to_string(),
                out_path.display().to_string(),
            ];
            let result = self.run(&args).await;
            let _ = std::fs::remove_file(&grib_path);
            result?;
        } else {
            let mut args = vec![
                "-f".to_string(),
                "nc".to_string(),
                "-P".to_string(),
                threads.to_string(),
            ];
            args.extend(command.pipeline_args());
            args.push(input.display().to_string());
            args.push(out_path.display().to_string());
            self.run(&args).await?;
        }

        if !out_path.exists() {
            return Err(CdoError::MissingOutput(out_path));
        }
        Ok(out_path)
    }

    async fn z_axes(&self, path: &Path, code: u32) -> Result<Vec<ZAxisType>, CdoError> {
        let args = vec![
            "showltype".to_string(),
            format!("-selcode,{}", code),
            path.display().to_string(),
        ];
        let output = self.run(&args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut axes = Vec::new();
        for token in stdout.split_whitespace() {
            let ltype: u32 = token
                .parse()
                .map_err(|_| CdoError::Parse(token.to_string()))?;
            if let Some(axis) = ZAxisType::from_grib_code(ltype) {
                if !axes.contains(&axis) {
                    axes.push(axis);
                }
            }
        }
        Ok(axes)
    }

    async fn levels(
        &self,
        path: &Path,
        code: u32,
        axis: ZAxisType,
    ) -> Result<Vec<f64>, CdoError> {
        let args = vec![
            "showlevel".to_string(),
            format!("-selzaxis,{}", axis.cdo_name()),
            format!("-selcode,{}", code),
            path.display().to_string(),
        ];
        let output = self.run(&args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut levels = Vec::new();
        for token in stdout.split_whitespace() {
            let level: f64 = token
                .parse()
                .map_err(|_| CdoError::Parse(token.to_string()))?;
            if !levels.contains(&level) {
                levels.push(level);
            }
        }
        Ok(levels)
    }
}
