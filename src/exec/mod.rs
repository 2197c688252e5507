//! External command execution.
//!
//! - [`CommandSpec`] describes one invocation: program, arguments, working
//!   directory, environment overlay, and an optional log file
//! - [`CommandRunner`] is the seam pipelines call through; [`ProcessExecutor`]
//!   is the real implementation
//! - [`multiplex`] tees a child's stdout and stderr to the UI and a log file

pub mod env;
pub mod multiplex;
pub mod process;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use env::{EnvOverlay, HostEnv};
pub use process::ProcessExecutor;

/// Errors raised when a command cannot be run to completion at all.
///
/// A child that starts and exits non-zero is not an `ExecError`; that outcome
/// is an unsuccessful [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not capture output of '{program}': {detail}")]
    Capture { program: String, detail: String },
}

/// One external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: EnvOverlay,
    pub log_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: EnvOverlay::new(),
            log_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    pub fn log_to(mut self, path: impl AsRef<Path>) -> Self {
        self.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Shell-like rendering for messages and logs.
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                out.push_str(&format!("'{}'", arg));
            } else {
                out.push_str(arg);
            }
        }
        out
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Outcome of a command that was started and waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub log_file: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn from_status(status: std::process::ExitStatus, log_file: Option<PathBuf>) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            log_file,
        }
    }
}

/// Collected stdout of a short query command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
}

/// Runs external commands on behalf of the pipelines.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, honouring the command's log file and the runner's
    /// output policy.
    async fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ExecError>;

    /// Run a short command and collect its stdout.
    async fn capture(&self, spec: &CommandSpec) -> Result<CapturedOutput, ExecError>;
}
