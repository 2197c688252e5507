use anyhow::{Context, Result};
use build_tool::logging::{self, LogLevel};
use build_tool::tool_config::ToolConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "build-tool")]
#[command(version, about = "Build Buildroot cross toolchains and GDB for multiple architectures")]
pub struct Cli {
    /// Directory holding architectures.conf and the output trees (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Diagnostic log level. Overrides BUILD_TOOL_LOG.
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every batch command.
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Clean build directories first
    #[arg(short, long)]
    pub clean: bool,

    /// Show command output instead of logging to files
    #[arg(short, long)]
    pub verbose: bool,

    /// Continue with remaining architectures after a failure
    #[arg(short, long)]
    pub keep_going: bool,

    /// Architectures to process (default: all)
    pub architectures: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build Buildroot toolchains for one or more architectures
    BuildToolchains {
        /// Number of parallel make jobs (default: available CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Buildroot source directory
        #[arg(short = 's', long)]
        buildroot_src: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Initialize Buildroot build directories without building
    InitToolchains {
        /// Buildroot source directory
        #[arg(short = 's', long)]
        buildroot_src: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Build GDB and gdbserver against previously built toolchains
    BuildGdb {
        /// Number of parallel make jobs (default: available CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// GDB source directory
        #[arg(short = 's', long)]
        gdb_src: Option<PathBuf>,

        /// Additional configure options
        #[arg(short = 'o', long, allow_hyphen_values = true)]
        configure_opts: Option<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Initialize GDB build directories (run configure) without building
    InitGdb {
        /// GDB source directory
        #[arg(short = 's', long)]
        gdb_src: Option<PathBuf>,

        /// Additional configure options
        #[arg(short = 'o', long, allow_hyphen_values = true)]
        configure_opts: Option<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Spawn a subshell with toolchain bin directories on PATH
    Shell {
        /// Toolchains to include (default: all built)
        architectures: Vec<String>,
    },
    /// List architectures and whether their toolchain is built
    ListArchs,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let tool_config = ToolConfig::load_or_default(&project_dir)?;
    let _log_guard = logging::init_logging(cli.log_level, tool_config.log_file(&project_dir).as_deref())?;

    let succeeded = match &cli.command {
        Commands::BuildToolchains {
            jobs,
            buildroot_src,
            batch,
        } => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, buildroot_src.as_deref(), None)?;
            cmd::cmd_build_toolchains(&ws, batch, *jobs).await?
        }
        Commands::InitToolchains {
            buildroot_src,
            batch,
        } => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, buildroot_src.as_deref(), None)?;
            cmd::cmd_init_toolchains(&ws, batch).await?
        }
        Commands::BuildGdb {
            jobs,
            gdb_src,
            configure_opts,
            batch,
        } => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, None, gdb_src.as_deref())?;
            cmd::cmd_build_gdb(&ws, batch, *jobs, configure_opts.as_deref()).await?
        }
        Commands::InitGdb {
            gdb_src,
            configure_opts,
            batch,
        } => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, None, gdb_src.as_deref())?;
            cmd::cmd_init_gdb(&ws, batch, configure_opts.as_deref()).await?
        }
        Commands::Shell { architectures } => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, None, None)?;
            cmd::cmd_shell(&ws, architectures).await?
        }
        Commands::ListArchs => {
            let ws = cmd::Workspace::open(&project_dir, tool_config, None, None)?;
            cmd::cmd_list_archs(&ws)?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
