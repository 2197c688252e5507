//! Toolchain batch commands — `build-tool build-toolchains` and
//! `build-tool init-toolchains`.

use anyhow::{Context, Result};
use build_tool::batch::{BatchScheduler, FailurePolicy, Operation};
use build_tool::exec::ProcessExecutor;
use build_tool::pipeline::ToolchainPipeline;
use build_tool::registry::ArchRegistry;
use build_tool::ui::icons::HAMMER;

use super::super::BatchArgs;
use super::{Workspace, print_header, reporter};

pub async fn cmd_build_toolchains(ws: &Workspace, args: &BatchArgs, jobs: Option<usize>) -> Result<bool> {
    let jobs = ws.config.jobs(jobs);
    run_toolchains(
        ws,
        args,
        Operation::Build {
            jobs,
            clean: args.clean,
        },
    )
    .await
}

pub async fn cmd_init_toolchains(ws: &Workspace, args: &BatchArgs) -> Result<bool> {
    run_toolchains(ws, args, Operation::Init { clean: args.clean }).await
}

async fn run_toolchains(ws: &Workspace, args: &BatchArgs, op: Operation) -> Result<bool> {
    let paths = &ws.paths;
    paths.require_buildroot_src()?;

    let registry = ArchRegistry::load(paths)?;
    let archs = registry.select(&args.architectures)?;

    let building = matches!(op, Operation::Build { .. });
    let mut rows = vec![
        ("Buildroot source:", paths.buildroot_src.display().to_string()),
        ("Output directory:", paths.toolchains_dir.display().to_string()),
        ("Build directory:", paths.builds_dir.display().to_string()),
    ];
    if let Operation::Build { jobs, .. } = op {
        rows.push(("Parallel jobs:", jobs.to_string()));
    }
    rows.push(("Architectures:", archs.len().to_string()));
    let title = if building {
        format!("{}Buildroot Toolchain Build", HAMMER)
    } else {
        "Buildroot Initialization".to_string()
    };
    print_header(&title, &rows);

    for dir in [&paths.toolchains_dir, &paths.builds_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let fragment = paths.load_global_fragment()?;

    let verbose = ws.config.verbose(args.verbose);
    let policy = FailurePolicy::from_keep_going(ws.config.keep_going(args.keep_going));
    let label = if building {
        "Building toolchains"
    } else {
        "Initializing toolchains"
    };
    let (sink, progress) = reporter(archs.len(), label);

    let executor = ProcessExecutor::new(verbose, sink.clone());
    let pipeline = ToolchainPipeline::new(paths, &executor, sink.clone(), fragment);

    let mut scheduler = BatchScheduler::new(policy, sink).with_live_output(executor.is_verbose());
    if let Some(progress) = progress {
        scheduler = scheduler.with_progress(progress);
    }
    scheduler = if building {
        scheduler
            .with_summary_title("Build Summary")
            .with_status_file(paths.toolchain_status_file())
            .with_footer(format!("Toolchains are in: {}", paths.toolchains_dir.display()))
    } else {
        scheduler.with_summary_title("Initialization Summary")
    };

    let results = scheduler.run(&pipeline, &archs, op).await?;
    Ok(results.all_succeeded())
}
