use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::errors::BuildError;

/// Runtime paths for one invocation.
///
/// The project directory holds the registry files and the output trees:
///
/// ```text
/// <project>/
///   architectures.conf           required
///   buildroot-fragment.conf      optional global fragment
///   external-toolchains.conf     optional
///   arch-buildroot-options.conf  optional
///   build-tool.toml              optional tool settings
///   toolchains/<arch>/           toolchain output (host dir)
///   builds/<arch>/               Buildroot build directories
///   gdb-builds/<arch>/           GDB build directories
/// ```
///
/// Set once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    pub project_dir: PathBuf,
    pub architectures_file: PathBuf,
    pub fragment_file: PathBuf,
    pub external_toolchains_file: PathBuf,
    pub arch_options_file: PathBuf,
    pub toolchains_dir: PathBuf,
    pub builds_dir: PathBuf,
    pub gdb_builds_dir: PathBuf,
    pub buildroot_src: PathBuf,
    pub gdb_src: PathBuf,
}

impl BuildPaths {
    /// Resolve the project directory and derive every fixed path from it.
    pub fn new(project_dir: &Path, buildroot_src: PathBuf, gdb_src: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve project directory {}", project_dir.display()))?;
        Ok(Self::from_root(project_dir, buildroot_src, gdb_src))
    }

    fn from_root(project_dir: PathBuf, buildroot_src: PathBuf, gdb_src: PathBuf) -> Self {
        Self {
            architectures_file: project_dir.join("architectures.conf"),
            fragment_file: project_dir.join("buildroot-fragment.conf"),
            external_toolchains_file: project_dir.join("external-toolchains.conf"),
            arch_options_file: project_dir.join("arch-buildroot-options.conf"),
            toolchains_dir: project_dir.join("toolchains"),
            builds_dir: project_dir.join("builds"),
            gdb_builds_dir: project_dir.join("gdb-builds"),
            project_dir,
            buildroot_src,
            gdb_src,
        }
    }

    #[cfg(test)]
    pub fn for_test(project_dir: &Path) -> Self {
        Self::from_root(
            project_dir.to_path_buf(),
            project_dir.join("src").join("buildroot"),
            project_dir.join("src").join("binutils-gdb"),
        )
    }

    /// Toolchain output (Buildroot host dir) for `arch`.
    pub fn toolchain_dir(&self, arch: &str) -> PathBuf {
        self.toolchains_dir.join(arch)
    }

    pub fn toolchain_bin_dir(&self, arch: &str) -> PathBuf {
        self.toolchain_dir(arch).join("bin")
    }

    pub fn toolchain_build_dir(&self, arch: &str) -> PathBuf {
        self.builds_dir.join(arch)
    }

    pub fn gdb_build_dir(&self, arch: &str) -> PathBuf {
        self.gdb_builds_dir.join(arch)
    }

    pub fn toolchain_status_file(&self) -> PathBuf {
        self.toolchains_dir.join("build-status.txt")
    }

    pub fn gdb_status_file(&self) -> PathBuf {
        self.gdb_builds_dir.join("build-status.txt")
    }

    /// Architectures with a toolchain output directory, sorted by name.
    pub fn available_toolchains(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.toolchains_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn require_buildroot_src(&self) -> Result<(), BuildError> {
        require_dir(&self.buildroot_src, "Buildroot", "BUILDROOT_SRC")
    }

    pub fn require_gdb_src(&self) -> Result<(), BuildError> {
        require_dir(&self.gdb_src, "GDB", "GDB_SRC")
    }

    /// Contents of the global Buildroot fragment. A missing file is treated as
    /// an empty fragment.
    pub fn load_global_fragment(&self) -> Result<String, BuildError> {
        match std::fs::read_to_string(&self.fragment_file) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.fragment_file.display(), "global fragment not found, using empty fragment");
                Ok(String::new())
            }
            Err(e) => Err(BuildError::configuration(format!(
                "Failed to read {}: {}",
                self.fragment_file.display(),
                e
            ))),
        }
    }
}

fn require_dir(path: &Path, what: &str, env_var: &str) -> Result<(), BuildError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(BuildError::configuration(format!(
            "{} source directory not found: {}\nSet {} environment variable or use -s option",
            what,
            path.display(),
            env_var
        )))
    }
}
