//! Cross-compilation environment for building against a finished toolchain.
//!
//! Derivation is pure apart from two reads: the toolchain's `bin` directory
//! (to find `<prefix>-gcc`) and one `-dumpmachine` query. The result is a
//! fresh [`CrossEnvironment`] each time; nothing is cached.

use crate::errors::BuildError;
use crate::exec::{CommandRunner, CommandSpec, EnvOverlay, HostEnv};
use crate::quirks::{self, ArchQuirk};
use crate::registry::Architecture;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from locating `<prefix>-gcc` in a toolchain `bin` directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Could not find cross-compiler in {}/", .0.display())]
    NotFound(PathBuf),

    #[error("Ambiguous cross-compiler prefixes: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

/// Find the cross-compiler prefix in `bin_dir`.
///
/// Buildroot installs both the full tuple (`arm-buildroot-linux-gnueabihf-gcc`)
/// and short aliases (`arm-linux-gcc`). The candidate with the most
/// hyphen-separated components wins; a tie between distinct prefixes is
/// ambiguous.
pub fn discover_cross_compiler(bin_dir: &Path) -> Result<String, DiscoveryError> {
    let pattern = format!(
        "{}/*-gcc",
        glob::Pattern::escape(&bin_dir.display().to_string())
    );
    let mut prefixes: Vec<String> = glob::glob(&pattern)
        .map(|paths| {
            paths
                .filter_map(|p| p.ok())
                .filter(|p| p.is_file())
                .filter_map(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| n.strip_suffix("-gcc"))
                        .filter(|prefix| !prefix.is_empty())
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    prefixes.sort();
    prefixes.dedup();

    let most = prefixes
        .iter()
        .map(|p| p.matches('-').count())
        .max()
        .ok_or_else(|| DiscoveryError::NotFound(bin_dir.to_path_buf()))?;
    let mut best: Vec<String> = prefixes
        .into_iter()
        .filter(|p| p.matches('-').count() == most)
        .collect();

    if best.len() == 1 {
        Ok(best.remove(0))
    } else {
        Err(DiscoveryError::Ambiguous(best))
    }
}

/// Everything a cross build needs, derived for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossEnvironment {
    pub prefix: String,
    pub triple: String,
    pub uses_ccache: bool,
    pub applied_quirks: Vec<ArchQuirk>,
    pub overlay: EnvOverlay,
}

/// Build the overlay for `prefix` under `bin_dir`.
///
/// `PATH` gets the toolchain first; compiler variables use `ccache` when the
/// host has it; quirk flags and the LTO workaround are appended to whatever
/// the host already exports.
pub fn build_overlay(arch: &Architecture, bin_dir: &Path, prefix: &str, host: &HostEnv) -> (EnvOverlay, bool) {
    let ccache = host.find_program("ccache").is_some();
    let wrap = |tool: &str| {
        if ccache {
            format!("ccache {}-{}", prefix, tool)
        } else {
            format!("{}-{}", prefix, tool)
        }
    };

    let env = EnvOverlay::new()
        .with_path_prepended(bin_dir, host.get("PATH"))
        .with_var("CROSS_COMPILE", prefix)
        .with_var("CC", wrap("gcc"))
        .with_var("CXX", wrap("g++"))
        .with_var("AR", format!("{}-ar", prefix))
        .with_var("RANLIB", format!("{}-ranlib", prefix));

    let env = quirks::apply_flags(env, arch.quirks(), |key| host.get(key));
    (env, ccache)
}

/// Derives [`CrossEnvironment`]s, querying the compiler through a
/// [`CommandRunner`].
pub struct CrossEnvDeriver<'a> {
    runner: &'a dyn CommandRunner,
    host: &'a HostEnv,
}

impl<'a> CrossEnvDeriver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, host: &'a HostEnv) -> Self {
        Self { runner, host }
    }

    /// Check that the toolchain exists and has a usable compiler.
    pub fn discover(&self, arch: &Architecture, toolchain_dir: &Path) -> Result<String, BuildError> {
        if !toolchain_dir.is_dir() {
            return Err(BuildError::precondition(
                &arch.name,
                format!("Toolchain not found: {}", toolchain_dir.display()),
            ));
        }
        discover_cross_compiler(&toolchain_dir.join("bin"))
            .map_err(|e| BuildError::precondition(&arch.name, e.to_string()))
    }

    pub async fn derive(&self, arch: &Architecture, toolchain_dir: &Path) -> Result<CrossEnvironment, BuildError> {
        let prefix = self.discover(arch, toolchain_dir)?;
        self.derive_with(arch, toolchain_dir, &prefix).await
    }

    /// Derive using an already discovered `prefix`.
    pub async fn derive_with(
        &self,
        arch: &Architecture,
        toolchain_dir: &Path,
        prefix: &str,
    ) -> Result<CrossEnvironment, BuildError> {
        let bin_dir = toolchain_dir.join("bin");
        let (overlay, uses_ccache) = build_overlay(arch, &bin_dir, prefix, self.host);

        let compiler = bin_dir.join(format!("{}-gcc", prefix));
        let query = CommandSpec::new(compiler.display().to_string())
            .arg("-dumpmachine")
            .env(overlay.clone());
        let output = self.runner.capture(&query).await.map_err(|e| {
            BuildError::precondition(&arch.name, format!("Failed to get target triplet: {}", e))
        })?;
        let triple = output.stdout.trim().to_string();
        if !output.success || triple.is_empty() {
            return Err(BuildError::precondition(
                &arch.name,
                format!(
                    "Failed to get target triplet: {} -dumpmachine exited with {:?}",
                    compiler.display(),
                    output.exit_code
                ),
            ));
        }

        tracing::debug!(arch = %arch.name, prefix, triple = %triple, uses_ccache, "derived cross environment");
        Ok(CrossEnvironment {
            prefix: prefix.to_string(),
            triple,
            uses_ccache,
            applied_quirks: arch.quirks().to_vec(),
            overlay,
        })
    }
}
