//! Tool settings from `build-tool.toml` in the project directory.
//!
//! Layered configuration (default → file → environment → CLI):
//!
//! ```toml
//! [sources]
//! buildroot = "/opt/src/buildroot"
//! gdb = "/opt/src/binutils-gdb"
//!
//! [defaults]
//! jobs = 16
//! keep_going = false
//! verbose = false
//!
//! [gdb]
//! configure_opts = "--enable-gdbserver --disable-sim"
//!
//! [logging]
//! file = "logs/build-tool.log"
//! ```
//!
//! Every section and key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::exec::HostEnv;

pub const CONFIG_FILE_NAME: &str = "build-tool.toml";
pub const DEFAULT_GDB_CONFIGURE_OPTS: &str = "--enable-gdbserver --disable-sim";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesSection {
    pub buildroot: Option<PathBuf>,
    pub gdb: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    pub jobs: Option<usize>,
    pub keep_going: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdbSection {
    #[serde(default = "default_configure_opts")]
    pub configure_opts: String,
}

impl Default for GdbSection {
    fn default() -> Self {
        Self {
            configure_opts: default_configure_opts(),
        }
    }
}

fn default_configure_opts() -> String {
    DEFAULT_GDB_CONFIGURE_OPTS.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Diagnostic log file, relative to the project directory unless absolute.
    pub file: Option<PathBuf>,
}

/// Contents of `build-tool.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub sources: SourcesSection,
    pub defaults: DefaultsSection,
    pub gdb: GdbSection,
    pub logging: LoggingSection,
}

impl ToolConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse build-tool.toml")
    }

    /// Load `build-tool.toml` from `project_dir`, or defaults when absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Buildroot source root: CLI flag, then `BUILDROOT_SRC`, then the file,
    /// then `~/src/buildroot`.
    pub fn buildroot_src(&self, cli: Option<&Path>, env: &HostEnv) -> PathBuf {
        resolve_source(cli, env.get("BUILDROOT_SRC"), self.sources.buildroot.as_deref(), "buildroot")
    }

    /// GDB source root: CLI flag, then `GDB_SRC`, then the file, then
    /// `~/src/binutils-gdb`.
    pub fn gdb_src(&self, cli: Option<&Path>, env: &HostEnv) -> PathBuf {
        resolve_source(cli, env.get("GDB_SRC"), self.sources.gdb.as_deref(), "binutils-gdb")
    }

    pub fn jobs(&self, cli: Option<usize>) -> usize {
        cli.or(self.defaults.jobs)
            .filter(|j| *j > 0)
            .unwrap_or_else(default_jobs)
    }

    pub fn keep_going(&self, cli: bool) -> bool {
        cli || self.defaults.keep_going
    }

    pub fn verbose(&self, cli: bool) -> bool {
        cli || self.defaults.verbose
    }

    pub fn configure_opts(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .unwrap_or_else(|| self.gdb.configure_opts.clone())
    }

    pub fn log_file(&self, project_dir: &Path) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|f| project_dir.join(f))
    }
}

fn resolve_source(cli: Option<&Path>, env: Option<&str>, file: Option<&Path>, default_name: &str) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Some(path) = env.filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = file {
        return path.to_path_buf();
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("src")
        .join(default_name)
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
