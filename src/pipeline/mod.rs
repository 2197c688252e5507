//! Per-architecture build pipelines.
//!
//! A pipeline moves one architecture through
//! `Uninitialized → Configured → Built`; any failing stage ends in
//! `Failed(stage)`. State is observed from filesystem markers, never stored.
//!
//! | Pipeline              | Configured marker                | Built marker                  |
//! |-----------------------|----------------------------------|-------------------------------|
//! | [`ToolchainPipeline`] | `builds/<arch>/.build-tool-configured` | compiler in `toolchains/<arch>/bin` |
//! | [`GdbPipeline`]       | `gdb-builds/<arch>/Makefile`     | `gdb-builds/<arch>/gdb/gdb`   |

pub mod gdb;
pub mod toolchain;

use crate::errors::{BuildError, Stage};
use crate::exec::{CommandRunner, CommandSpec, ExecutionResult};
use crate::registry::Architecture;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

pub use gdb::GdbPipeline;
pub use toolchain::ToolchainPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Configured,
    Built,
    Failed(Stage),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Uninitialized => f.write_str("uninitialized"),
            PipelineState::Configured => f.write_str("configured"),
            PipelineState::Built => f.write_str("built"),
            PipelineState::Failed(stage) => write!(f, "failed at {}", stage),
        }
    }
}

/// What a pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Toolchain,
    Gdb,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Toolchain => f.write_str("toolchain"),
            PipelineKind::Gdb => f.write_str("GDB"),
        }
    }
}

/// One architecture's init/build state machine.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> PipelineKind;

    /// Current state as observed on disk.
    fn state(&self, arch: &Architecture) -> PipelineState;

    /// Bring `arch` to `Configured`. With `clean`, the build directory is
    /// removed and recreated first.
    async fn init(&self, arch: &Architecture, clean: bool) -> Result<PipelineState, BuildError>;

    /// Bring `arch` to `Built`, running `init` first when `clean` is set or
    /// the architecture is not yet configured.
    async fn build(&self, arch: &Architecture, jobs: usize, clean: bool) -> Result<PipelineState, BuildError>;
}

/// Optionally wipe `dir`, then make sure it exists.
pub(crate) fn prepare_build_dir(arch: &str, dir: &Path, clean: bool) -> Result<(), BuildError> {
    if clean && dir.exists() {
        tracing::info!(arch, dir = %dir.display(), "cleaning build directory");
        std::fs::remove_dir_all(dir).map_err(|e| BuildError::io(arch, Stage::Clean, dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| BuildError::io(arch, Stage::Clean, dir, e))
}

/// Run one stage command and fold its outcome into a `BuildError`.
pub(crate) async fn run_stage(
    runner: &dyn CommandRunner,
    arch: &str,
    stage: Stage,
    spec: &CommandSpec,
) -> Result<ExecutionResult, BuildError> {
    let result = runner.run(spec).await.map_err(|source| BuildError::Execution {
        arch: arch.to_string(),
        stage,
        source,
    })?;

    if result.success {
        Ok(result)
    } else {
        tracing::warn!(arch, %stage, exit_code = ?result.exit_code, "stage failed");
        Err(BuildError::StageFailure {
            arch: arch.to_string(),
            stage,
            exit_code: result.exit_code,
            log: result.log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeOutcome, RecordingRunner};
    use tempfile::tempdir;

    #[test]
    fn test_prepare_build_dir_clean_removes_contents() {
        let dir = tempdir().unwrap();
        let build = dir.path().join("arm");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::write(build.join(".config"), "stale").unwrap();

        prepare_build_dir("arm", &build, false).unwrap();
        assert!(build.join(".config").exists());

        prepare_build_dir("arm", &build, true).unwrap();
        assert!(build.is_dir());
        assert!(!build.join(".config").exists());
    }

    #[tokio::test]
    async fn test_run_stage_maps_nonzero_exit() {
        let runner = RecordingRunner::with_handler(|_| Ok(FakeOutcome::exit(2)));
        let spec = CommandSpec::new("make").log_to("/b/build.log");
        let err = run_stage(&runner, "arm", Stage::Build, &spec).await.unwrap_err();

        match err {
            BuildError::StageFailure { arch, stage, exit_code, log } => {
                assert_eq!(arch, "arm");
                assert_eq!(stage, Stage::Build);
                assert_eq!(exit_code, Some(2));
                assert_eq!(log.as_deref(), Some(Path::new("/b/build.log")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Failed(Stage::Merge).to_string(), "failed at merge");
        assert_eq!(PipelineState::Configured.to_string(), "configured");
    }
}
