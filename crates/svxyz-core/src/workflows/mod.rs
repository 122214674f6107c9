//! # Workflows Module
//!
//! High-level, single-pass procedures built from the core readers and the engine.
//!
//! - **Filtering** ([`filter`]) - streams one or more trajectories through the filter
//!   pipeline into a single extended XYZ file, collecting per-filter statistics.
//! - **Extraction** ([`extract`]) - writes per-frame energy, force, virial and stress
//!   tables for one trajectory.
//!
//! Both report progress through [`ProgressReporter`](crate::engine::progress::ProgressReporter)
//! and stop at the first error, keeping whatever output was already written.

pub mod extract;
pub mod filter;

use crate::core::io::error::{ParseError, WriteError};
use crate::engine::config::ConfigError;
use extract::ExtractError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read trajectory '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Output '{path}' is also an input; refusing to overwrite it", path = path.display())]
    OutputIsInput { path: PathBuf },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
