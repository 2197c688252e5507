use crate::compose::{self, ComposeReport};
use crate::config::BuildPaths;
use crate::cross_env::discover_cross_compiler;
use crate::errors::{BuildError, Stage};
use crate::exec::{CommandRunner, CommandSpec};
use crate::pipeline::{Pipeline, PipelineKind, PipelineState, prepare_build_dir, run_stage};
use crate::registry::Architecture;
use crate::ui::OutputSink;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Written into the build directory once `make olddefconfig` has succeeded.
pub const CONFIGURED_STAMP: &str = ".build-tool-configured";

/// Buildroot toolchain pipeline: defconfig, fragment composition, merge, build.
pub struct ToolchainPipeline<'a> {
    paths: &'a BuildPaths,
    runner: &'a dyn CommandRunner,
    sink: Arc<dyn OutputSink>,
    global_fragment: String,
}

impl<'a> ToolchainPipeline<'a> {
    pub fn new(
        paths: &'a BuildPaths,
        runner: &'a dyn CommandRunner,
        sink: Arc<dyn OutputSink>,
        global_fragment: String,
    ) -> Self {
        Self {
            paths,
            runner,
            sink,
            global_fragment,
        }
    }

    fn stamp(&self, arch: &str) -> PathBuf {
        self.paths.toolchain_build_dir(arch).join(CONFIGURED_STAMP)
    }

    fn is_configured(&self, arch: &str) -> bool {
        self.stamp(arch).is_file()
    }

    fn defconfig_command(&self, arch: &Architecture, build_dir: &Path) -> CommandSpec {
        CommandSpec::new("make")
            .arg("-C")
            .arg(self.paths.buildroot_src.display().to_string())
            .arg(format!("O={}", build_dir.display()))
            .arg(&arch.defconfig)
    }

    fn report_compose(&self, report: &ComposeReport) {
        if let Some(toolchain) = &report.external_toolchain {
            self.sink
                .message(&format!("Using external Bootlin toolchain: {}", toolchain));
        }
        if !report.extra_options.is_empty() {
            self.sink.message(&format!(
                "Applying architecture-specific options: {}",
                report.extra_options.join(", ")
            ));
        }
    }
}

#[async_trait]
impl<'a> Pipeline for ToolchainPipeline<'a> {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Toolchain
    }

    fn state(&self, arch: &Architecture) -> PipelineState {
        if discover_cross_compiler(&self.paths.toolchain_bin_dir(&arch.name)).is_ok() {
            PipelineState::Built
        } else if self.is_configured(&arch.name) {
            PipelineState::Configured
        } else {
            PipelineState::Uninitialized
        }
    }

    async fn init(&self, arch: &Architecture, clean: bool) -> Result<PipelineState, BuildError> {
        let name = arch.name.as_str();
        let build_dir = self.paths.toolchain_build_dir(name);
        let output_dir = self.paths.toolchain_dir(name);

        if clean && build_dir.exists() {
            self.sink
                .message(&format!("Cleaning build directory for {}...", name));
        }
        prepare_build_dir(name, &build_dir, clean)?;

        let stamp = self.stamp(name);
        match std::fs::remove_file(&stamp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(name, Stage::Configure, &stamp, e)),
        }

        self.sink
            .message(&format!("Configuring buildroot with {}...", arch.defconfig));
        run_stage(self.runner, name, Stage::Configure, &self.defconfig_command(arch, &build_dir)).await?;

        self.sink.message("Applying configuration fragment...");
        let config_file = build_dir.join(".config");
        let report = compose::compose(&config_file, arch, &self.global_fragment, &output_dir)
            .map_err(|e| BuildError::io(name, Stage::Compose, &config_file, e))?;
        self.report_compose(&report);

        self.sink
            .message("Running olddefconfig to merge configuration...");
        run_stage(self.runner, name, Stage::Merge, &compose::merge_command(&build_dir)).await?;

        std::fs::write(&stamp, format!("{}\n", arch.defconfig))
            .map_err(|e| BuildError::io(name, Stage::Merge, &stamp, e))?;

        tracing::info!(arch = name, build_dir = %build_dir.display(), "toolchain configured");
        self.sink
            .message(&format!("SUCCESS: Build directory initialized for {}", name));
        self.sink
            .message(&format!("Build directory: {}", build_dir.display()));
        Ok(PipelineState::Configured)
    }

    async fn build(&self, arch: &Architecture, jobs: usize, clean: bool) -> Result<PipelineState, BuildError> {
        let name = arch.name.as_str();
        let build_dir = self.paths.toolchain_build_dir(name);

        if clean || !self.is_configured(name) {
            self.init(arch, clean).await?;
        } else {
            self.sink.message(&format!(
                "Using existing configuration in {}",
                build_dir.display()
            ));
        }

        self.sink.message(&format!(
            "Building toolchain and target libraries for {} (this may take a while)...",
            name
        ));
        let make = CommandSpec::new("make")
            .arg(format!("-j{}", jobs))
            .current_dir(&build_dir)
            .log_to(build_dir.join("build.log"));
        run_stage(self.runner, name, Stage::Build, &make).await?;

        tracing::info!(arch = name, "toolchain built");
        self.sink
            .message(&format!("SUCCESS: Toolchain for {} built successfully", name));
        self.sink.message(&format!(
            "Toolchain location: {}",
            self.paths.toolchain_dir(name).display()
        ));
        Ok(PipelineState::Built)
    }
}
