//! GDB batch commands — `build-tool build-gdb` and `build-tool init-gdb`.

use anyhow::{Context, Result};
use build_tool::batch::{BatchScheduler, FailurePolicy, Operation};
use build_tool::config::BuildPaths;
use build_tool::errors::BuildError;
use build_tool::exec::ProcessExecutor;
use build_tool::pipeline::GdbPipeline;
use build_tool::registry::{ArchRegistry, Architecture};
use build_tool::ui::icons::HAMMER;

use super::super::BatchArgs;
use super::{Workspace, print_header, reporter};

pub async fn cmd_build_gdb(
    ws: &Workspace,
    args: &BatchArgs,
    jobs: Option<usize>,
    configure_opts: Option<&str>,
) -> Result<bool> {
    let jobs = ws.config.jobs(jobs);
    run_gdb(
        ws,
        args,
        configure_opts,
        Operation::Build {
            jobs,
            clean: args.clean,
        },
    )
    .await
}

pub async fn cmd_init_gdb(ws: &Workspace, args: &BatchArgs, configure_opts: Option<&str>) -> Result<bool> {
    run_gdb(ws, args, configure_opts, Operation::Init { clean: args.clean }).await
}

/// Requested architectures, or every built toolchain when none are named.
///
/// The toolchain directory is what matters for a GDB build, so names outside
/// the registry are accepted.
pub(crate) fn resolve_gdb_archs(paths: &BuildPaths, requested: &[String]) -> Result<Vec<Architecture>, BuildError> {
    let registry = if paths.architectures_file.exists() {
        ArchRegistry::load(paths)?
    } else {
        ArchRegistry::default()
    };

    let names = if requested.is_empty() {
        let available = paths.available_toolchains();
        if available.is_empty() {
            return Err(BuildError::configuration(format!(
                "No toolchains found in {}\nRun build-toolchains or init-toolchains first",
                paths.toolchains_dir.display()
            )));
        }
        available
    } else {
        requested.to_vec()
    };

    Ok(names
        .into_iter()
        .map(|name| {
            registry
                .get(&name)
                .cloned()
                .unwrap_or_else(|| Architecture::new(name, ""))
        })
        .collect())
}

async fn run_gdb(ws: &Workspace, args: &BatchArgs, configure_opts: Option<&str>, op: Operation) -> Result<bool> {
    let paths = &ws.paths;
    paths.require_gdb_src()?;

    let archs = resolve_gdb_archs(paths, &args.architectures)?;
    let configure_opts = ws.config.configure_opts(configure_opts);

    let building = matches!(op, Operation::Build { .. });
    let mut rows = vec![
        ("GDB source:", paths.gdb_src.display().to_string()),
        ("Toolchains base:", paths.toolchains_dir.display().to_string()),
        ("Build directory:", paths.gdb_builds_dir.display().to_string()),
    ];
    if let Operation::Build { jobs, .. } = op {
        rows.push(("Parallel jobs:", jobs.to_string()));
    }
    rows.push(("Configure opts:", configure_opts.clone()));
    rows.push(("Architectures:", archs.len().to_string()));
    let title = if building {
        format!("{}GDB Build", HAMMER)
    } else {
        "GDB Initialization".to_string()
    };
    print_header(&title, &rows);

    std::fs::create_dir_all(&paths.gdb_builds_dir)
        .with_context(|| format!("Failed to create {}", paths.gdb_builds_dir.display()))?;

    let verbose = ws.config.verbose(args.verbose);
    let policy = FailurePolicy::from_keep_going(ws.config.keep_going(args.keep_going));
    let label = if building { "Building GDB" } else { "Initializing GDB" };
    let (sink, progress) = reporter(archs.len(), label);

    let executor = ProcessExecutor::new(verbose, sink.clone());
    let pipeline = GdbPipeline::new(paths, &executor, &ws.host, sink.clone(), &configure_opts);

    let mut scheduler = BatchScheduler::new(policy, sink).with_live_output(executor.is_verbose());
    if let Some(progress) = progress {
        scheduler = scheduler.with_progress(progress);
    }
    scheduler = if building {
        scheduler
            .with_summary_title("GDB Build Summary")
            .with_status_file(paths.gdb_status_file())
            .with_footer(format!("GDB builds are in: {}", paths.gdb_builds_dir.display()))
    } else {
        scheduler.with_summary_title("Initialization Summary")
    };

    let results = scheduler.run(&pipeline, &archs, op).await?;
    Ok(results.all_succeeded())
}
