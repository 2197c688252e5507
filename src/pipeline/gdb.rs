use crate::config::BuildPaths;
use crate::cross_env::{CrossEnvDeriver, CrossEnvironment};
use crate::errors::{BuildError, Stage};
use crate::exec::{CommandRunner, CommandSpec, HostEnv};
use crate::pipeline::{Pipeline, PipelineKind, PipelineState, prepare_build_dir, run_stage};
use crate::quirks::{ArchQuirk, LTO_WORKAROUND};
use crate::registry::Architecture;
use crate::ui::OutputSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const EXECUTABLES: [&str; 2] = ["gdb", "gdbserver"];
const MAX_LISTED: usize = 5;

/// GDB/gdbserver pipeline, built against a toolchain from `toolchains/<arch>`.
pub struct GdbPipeline<'a> {
    paths: &'a BuildPaths,
    runner: &'a dyn CommandRunner,
    host: &'a HostEnv,
    sink: Arc<dyn OutputSink>,
    configure_opts: Vec<String>,
}

impl<'a> GdbPipeline<'a> {
    pub fn new(
        paths: &'a BuildPaths,
        runner: &'a dyn CommandRunner,
        host: &'a HostEnv,
        sink: Arc<dyn OutputSink>,
        configure_opts: &str,
    ) -> Self {
        Self {
            paths,
            runner,
            host,
            sink,
            configure_opts: configure_opts.split_whitespace().map(str::to_string).collect(),
        }
    }

    fn deriver(&self) -> CrossEnvDeriver<'_> {
        CrossEnvDeriver::new(self.runner, self.host)
    }

    fn is_configured(&self, arch: &str) -> bool {
        self.paths.gdb_build_dir(arch).join("Makefile").is_file()
    }

    fn configure_command(&self, env: &CrossEnvironment, build_dir: &Path) -> CommandSpec {
        CommandSpec::new(self.paths.gdb_src.join("configure").display().to_string())
            .arg(format!("--host={}", env.triple))
            .arg(format!("--target={}", env.triple))
            .args(self.configure_opts.iter().cloned())
            .current_dir(build_dir)
            .env(env.overlay.clone())
            .log_to(build_dir.join("configure.log"))
    }

    fn report_environment(&self, env: &CrossEnvironment) {
        for quirk in &env.applied_quirks {
            let msg = match quirk {
                ArchQuirk::LinkLibatomic => {
                    "Added -latomic to LDFLAGS (architecture requires libatomic)"
                }
                ArchQuirk::LongCalls => {
                    "Added -mlongcalls to CFLAGS/CXXFLAGS (architecture requirement)"
                }
            };
            self.sink.message(msg);
        }
        let lto_vars: Vec<&str> = LTO_WORKAROUND.iter().map(|(key, _)| *key).collect();
        self.sink.message(&format!(
            "Added -fno-lto to {} (disable LTO)",
            lto_vars.join("/")
        ));
        self.sink
            .message(&format!("Target triplet: {}", env.triple));
        self.sink
            .message(&format!("Cross prefix:   {}", env.prefix));
        if env.uses_ccache {
            self.sink.message("Using ccache:   yes");
        }
    }

    /// Check the toolchain, prepare the build directory, derive the
    /// environment and run `configure`.
    async fn configure(&self, arch: &Architecture, clean: bool) -> Result<CrossEnvironment, BuildError> {
        let name = arch.name.as_str();
        let toolchain_dir = self.paths.toolchain_dir(name);
        let build_dir = self.paths.gdb_build_dir(name);

        let prefix = self.deriver().discover(arch, &toolchain_dir)?;

        if clean && build_dir.exists() {
            self.sink
                .message(&format!("Cleaning build directory for {}...", name));
        }
        prepare_build_dir(name, &build_dir, clean)?;

        let env = self
            .deriver()
            .derive_with(arch, &toolchain_dir, &prefix)
            .await?;
        self.report_environment(&env);

        self.sink.message(&format!("Configuring GDB for {}...", name));
        run_stage(self.runner, name, Stage::Configure, &self.configure_command(&env, &build_dir)).await?;

        tracing::info!(arch = name, triple = %env.triple, "gdb configured");
        self.sink
            .message(&format!("SUCCESS: Build directory initialized for {}", name));
        self.sink
            .message(&format!("Build directory: {}", build_dir.display()));
        Ok(env)
    }

    /// Up to five of each built executable under `build_dir`.
    fn built_executables(build_dir: &Path) -> Vec<PathBuf> {
        EXECUTABLES
            .iter()
            .flat_map(|exe| {
                WalkDir::new(build_dir)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && e.file_name() == *exe)
                    .take(MAX_LISTED)
                    .map(|e| e.into_path())
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[async_trait]
impl<'a> Pipeline for GdbPipeline<'a> {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Gdb
    }

    fn state(&self, arch: &Architecture) -> PipelineState {
        let build_dir = self.paths.gdb_build_dir(&arch.name);
        if build_dir.join("gdb").join("gdb").is_file() {
            PipelineState::Built
        } else if self.is_configured(&arch.name) {
            PipelineState::Configured
        } else {
            PipelineState::Uninitialized
        }
    }

    async fn init(&self, arch: &Architecture, clean: bool) -> Result<PipelineState, BuildError> {
        self.configure(arch, clean).await?;
        Ok(PipelineState::Configured)
    }

    async fn build(&self, arch: &Architecture, jobs: usize, clean: bool) -> Result<PipelineState, BuildError> {
        let name = arch.name.as_str();
        let build_dir = self.paths.gdb_build_dir(name);

        let env = if clean || !self.is_configured(name) {
            self.configure(arch, clean).await?
        } else {
            self.sink.message(&format!(
                "Using existing configuration in {}",
                build_dir.display()
            ));
            let env = self
                .deriver()
                .derive(arch, &self.paths.toolchain_dir(name))
                .await?;
            if env.uses_ccache {
                self.sink.message("Using ccache:   yes");
            }
            env
        };

        self.sink
            .message(&format!("Building GDB and gdbserver for {}...", name));
        let make = CommandSpec::new("make")
            .arg(format!("-j{}", jobs))
            .args(["all-gdb", "all-gdbserver"])
            .current_dir(&build_dir)
            .env(env.overlay)
            .log_to(build_dir.join("build.log"));
        run_stage(self.runner, name, Stage::Build, &make).await?;

        tracing::info!(arch = name, "gdb built");
        self.sink
            .message(&format!("SUCCESS: GDB for {} built successfully", name));
        self.sink.message("Built executables:");
        for path in Self::built_executables(&build_dir) {
            self.sink.message(&format!("  {}", path.display()));
        }
        Ok(PipelineState::Built)
    }
}
