//! Typed error hierarchy for the build orchestrator.
//!
//! Two enums cover the two layers:
//! - `BuildError` — per-architecture pipeline failures, plus the
//!   invocation-wide `Configuration` and `Report` variants
//! - `ExecError` — a command could not be started or waited on (lives in
//!   [`crate::exec`], wrapped here by `BuildError::Execution`)

use crate::exec::ExecError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A named step inside a pipeline. Carried by every per-architecture failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Removing and recreating the per-architecture build directory
    Clean,
    /// Base configuration (`make <defconfig>` or `./configure`)
    Configure,
    /// Appending configuration fragments
    Compose,
    /// `make olddefconfig`
    Merge,
    /// Cross-compiler discovery and environment derivation
    DeriveEnvironment,
    /// The main build
    Build,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clean => "clean",
            Stage::Configure => "configure",
            Stage::Compose => "compose",
            Stage::Merge => "merge",
            Stage::DeriveEnvironment => "derive-environment",
            Stage::Build => "build",
        };
        f.write_str(name)
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

/// Errors from initializing or building a single architecture.
///
/// [`BuildError::Configuration`] and [`BuildError::Report`] are fatal for a
/// whole invocation; every other variant is folded into the batch result for
/// its architecture.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{arch}: {detail}")]
    Precondition { arch: String, detail: String },

    #[error("{arch}: {stage} step failed with {}", exit_label(.exit_code))]
    StageFailure {
        arch: String,
        stage: Stage,
        exit_code: Option<i32>,
        log: Option<PathBuf>,
    },

    #[error("{arch}: {stage} step could not run: {source}")]
    Execution {
        arch: String,
        stage: Stage,
        #[source]
        source: ExecError,
    },

    #[error("{arch}: {stage} step failed on {}: {source}", .path.display())]
    Io {
        arch: String,
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write status report at {}: {source}", .path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        BuildError::Configuration(msg.into())
    }

    pub fn precondition(arch: &str, detail: impl Into<String>) -> Self {
        BuildError::Precondition {
            arch: arch.to_string(),
            detail: detail.into(),
        }
    }

    pub fn io(arch: &str, stage: Stage, path: &Path, source: std::io::Error) -> Self {
        BuildError::Io {
            arch: arch.to_string(),
            stage,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error must abort the whole invocation rather than a single
    /// architecture.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::Configuration(_) | BuildError::Report { .. })
    }

    /// The architecture the failure belongs to, if any.
    pub fn arch(&self) -> Option<&str> {
        match self {
            BuildError::Precondition { arch, .. }
            | BuildError::StageFailure { arch, .. }
            | BuildError::Execution { arch, .. }
            | BuildError::Io { arch, .. } => Some(arch),
            BuildError::Configuration(_) | BuildError::Report { .. } => None,
        }
    }

    /// The pipeline stage that failed. Precondition failures belong to
    /// environment derivation.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BuildError::Precondition { .. } => Some(Stage::DeriveEnvironment),
            BuildError::StageFailure { stage, .. }
            | BuildError::Execution { stage, .. }
            | BuildError::Io { stage, .. } => Some(*stage),
            BuildError::Configuration(_) | BuildError::Report { .. } => None,
        }
    }

    /// Log file holding the failing command's output, when one was written.
    pub fn log_file(&self) -> Option<&Path> {
        match self {
            BuildError::StageFailure { log, .. } => log.as_deref(),
            _ => None,
        }
    }
}
