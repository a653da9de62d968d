//! cmorpost CLI - Command-line driver for the post-processing engine.
//!
//! Reads a JSON task manifest, derives the deduplicated CDO command set
//! and executes it, then reports which targets were produced.

mod error;
mod manifest;

use clap::Parser;
use cmorpost::cdo::SystemCdo;
use cmorpost::config::{ExecutionMode, PostProcSettings, Size};
use cmorpost::postproc::PostProcessor;
use error::CliError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cmorpost")]
#[command(version = cmorpost::VERSION)]
#[command(about = "Post-process IFS output into CMOR-ready NetCDF files", long_about = None)]
struct Args {
    /// Task manifest (JSON)
    #[arg(long)]
    manifest: PathBuf,

    /// Directory for produced NetCDF files (omit to use a temporary
    /// location)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Execution mode: skip, append or recreate
    #[arg(long, default_value = "recreate")]
    mode: String,

    /// Worker threads for command groups (<= 2 runs serially)
    #[arg(long, default_value = "1")]
    task_threads: usize,

    /// Threads per cdo invocation
    #[arg(long, default_value = "4")]
    cdo_threads: usize,

    /// Cumulative output size budget, e.g. "20GB" (unlimited if omitted)
    #[arg(long)]
    max_size: Option<String>,

    /// Raw IFS output frequency in hours
    #[arg(long, default_value = "3")]
    output_frequency: u32,

    /// Path to the cdo binary
    #[arg(long, default_value = "cdo")]
    cdo_binary: PathBuf,
}

fn settings_from(args: &Args) -> Result<PostProcSettings, CliError> {
    let mode: ExecutionMode = args.mode.parse().map_err(|e| CliError::Option {
        option: "--mode".to_string(),
        message: format!("{}", e),
    })?;
    let max_size = args
        .max_size
        .as_deref()
        .map(|s| s.parse::<Size>())
        .transpose()
        .map_err(|e| CliError::Option {
            option: "--max-size".to_string(),
            message: format!("{}", e),
        })?;
    Ok(PostProcSettings {
        mode,
        task_threads: args.task_threads,
        cdo_threads: args.cdo_threads,
        max_size,
        output_frequency_hours: args.output_frequency,
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _guard = match cmorpost::logging::init_logging(
        cmorpost::logging::default_log_dir(),
        cmorpost::logging::default_log_file(),
    ) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let settings = match settings_from(&args) {
        Ok(settings) => settings,
        Err(e) => e.exit(),
    };
    let loaded = match manifest::load(&args.manifest) {
        Ok(loaded) => loaded,
        Err(e) => e.exit(),
    };

    println!(
        "Post-processing {} task(s) in {} mode",
        loaded.tasks.len(),
        settings.mode
    );

    let engine = PostProcessor::new(
        settings,
        Arc::new(SystemCdo::with_binary(&args.cdo_binary)),
        Arc::new(loaded.registry),
    );
    let finished = engine
        .post_process(&loaded.tasks, args.output_dir.as_deref(), loaded.grid)
        .await;

    let failed = loaded.tasks.iter().filter(|t| t.is_failed()).count();
    println!();
    println!("Produced {} target(s), {} failed", finished.len(), failed);
    for task in &finished {
        if let Some(path) = task.path() {
            println!("  {} ({}): {}", task.target().variable, task.target().table, path.display());
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
