//! cmorpost - CDO-based post-processing for CMOR-standardized climate output
//!
//! This library turns a batch of extraction tasks (IFS atmosphere model
//! fields destined for CMOR tables) into the minimal set of distinct CDO
//! pipelines, runs each pipeline exactly once, and tracks every task
//! through a small lifecycle state machine.
//!
//! # High-Level API
//!
//! The [`postproc`] module provides the engine facade:
//!
//! ```ignore
//! use cmorpost::cdo::SystemCdo;
//! use cmorpost::config::PostProcSettings;
//! use cmorpost::postproc::PostProcessor;
//!
//! let settings = PostProcSettings::default();
//! let engine = PostProcessor::new(settings, Arc::new(SystemCdo::new()), registry);
//!
//! let finished = engine.post_process(&tasks, Some(out_dir), grid).await;
//! ```

pub mod cdo;
pub mod config;
pub mod logging;
pub mod postproc;
pub mod schema;
pub mod task;

/// Version of the cmorpost library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
