//! Error definitions.
//!
//! The simulated protocol itself has no recoverable errors: a transaction that breaks the
//! bucket protocol is an upstream bug and aborts the simulation. This module defines the
//! two places where genuine, reportable failures occur:
//! 1. **Setup Errors:** The DRAM backend could not be initialized from its parameter files.
//! 2. **Config Errors:** The simulator configuration could not be loaded or is inconsistent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to initialize a DRAM timing backend.
///
/// Returned before the first simulated cycle; the embedding system is expected to abort.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The backend configuration file does not exist or cannot be opened.
    #[error("can't open DRAM configuration file {path}")]
    MissingConfig {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The DRAM chip parameter file does not exist or cannot be opened.
    #[error("missing DRAM chip parameter file {path}")]
    MissingChipParams {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A parameter line could not be parsed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File containing the bad line.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A required parameter was never given.
    #[error("required DRAM parameter {0} not set")]
    MissingParameter(&'static str),

    /// The address geometry does not add up.
    #[error("DRAM geometry needs {needed} address bits but ADDRESS_BITS is {configured}")]
    Geometry {
        /// Bits implied by channels, ranks, banks, rows, columns and line size.
        needed: u32,
        /// Value of `ADDRESS_BITS`.
        configured: u32,
    },
}

/// Failure to load or validate a simulator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("can't read configuration {path}")]
    Io {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid JSON for [`Config`](crate::config::Config).
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
