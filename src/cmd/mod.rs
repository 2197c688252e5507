//! CLI command implementations.
//!
//! | Module      | Commands handled                       |
//! |-------------|----------------------------------------|
//! | `toolchain` | `BuildToolchains`, `InitToolchains`    |
//! | `gdb`       | `BuildGdb`, `InitGdb`                  |
//! | `shell`     | `Shell`                                |
//! | `archs`     | `ListArchs`                            |

pub mod archs;
pub mod gdb;
pub mod shell;
pub mod toolchain;

pub use archs::cmd_list_archs;
pub use gdb::{cmd_build_gdb, cmd_init_gdb};
pub use shell::cmd_shell;
pub use toolchain::{cmd_build_toolchains, cmd_init_toolchains};

use anyhow::Result;
use build_tool::config::BuildPaths;
use build_tool::exec::HostEnv;
use build_tool::tool_config::ToolConfig;
use build_tool::ui::{BatchProgress, BatchUI, ConsoleSink, OutputSink};
use console::style;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs: resolved paths, tool settings and the host
/// environment snapshot.
pub struct Workspace {
    pub paths: BuildPaths,
    pub config: ToolConfig,
    pub host: HostEnv,
}

impl Workspace {
    /// Resolve paths with source roots layered CLI → environment → file →
    /// default.
    pub fn open(
        project_dir: &Path,
        config: ToolConfig,
        buildroot_src: Option<&Path>,
        gdb_src: Option<&Path>,
    ) -> Result<Self> {
        let host = HostEnv::capture();
        let paths = BuildPaths::new(
            project_dir,
            config.buildroot_src(buildroot_src, &host),
            config.gdb_src(gdb_src, &host),
        )?;
        Ok(Self { paths, config, host })
    }
}

/// Print a titled block of `label value` rows before a batch starts.
pub(crate) fn print_header(title: &str, rows: &[(&str, String)]) {
    let rule = "=".repeat(50);
    println!("{}", rule);
    println!("{}", style(title).bold());
    println!("{}", rule);
    for (label, value) in rows {
        println!("{:<18}{}", label, value);
    }
    println!();
}

/// Console output for a single architecture, progress bars for several.
pub(crate) fn reporter(count: usize, label: &str) -> (Arc<dyn OutputSink>, Option<Arc<dyn BatchProgress>>) {
    if count > 1 {
        let ui = Arc::new(BatchUI::new(count, label));
        let sink: Arc<dyn OutputSink> = ui.clone();
        let progress: Arc<dyn BatchProgress> = ui;
        (sink, Some(progress))
    } else {
        let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink);
        (sink, None)
    }
}
