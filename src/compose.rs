//! Buildroot `.config` composition.
//!
//! After `make <defconfig>` generates a base configuration, fragments are
//! appended in a fixed order (global fragment, external toolchain stanza,
//! per-architecture options), the host directory is pointed at the
//! architecture's output tree, and `make olddefconfig` resolves the result.

use crate::exec::CommandSpec;
use crate::registry::Architecture;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

const HOST_DIR_KEY: &str = "BR2_HOST_DIR=";

/// What [`compose`] changed, for user-facing reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeReport {
    pub external_toolchain: Option<String>,
    pub extra_options: Vec<String>,
    pub host_dir_rewritten: bool,
}

/// Three directives selecting a Bootlin external toolchain.
pub fn external_toolchain_fragment(arch: &str, toolchain: &str) -> String {
    format!(
        "# External toolchain configuration for {arch}\n\
         BR2_TOOLCHAIN_EXTERNAL=y\n\
         BR2_TOOLCHAIN_EXTERNAL_BOOTLIN=y\n\
         BR2_TOOLCHAIN_EXTERNAL_BOOTLIN_{toolchain}=y\n"
    )
}

fn options_fragment(arch: &str, options: &[String]) -> String {
    let mut out = format!("\n# Architecture-specific options for {arch}\n");
    for option in options {
        out.push_str(option);
        out.push('\n');
    }
    out
}

/// Rewrite the first `BR2_HOST_DIR=` line to `host_dir`. Returns `None` when
/// no such line exists.
pub fn rewrite_host_dir(content: &str, host_dir: &Path) -> Option<String> {
    let mut replaced = false;
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if !replaced && line.starts_with(HOST_DIR_KEY) {
            out.push_str(&format!("{}\"{}\"\n", HOST_DIR_KEY, host_dir.display()));
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    replaced.then_some(out)
}

/// Append every applicable fragment to `config_file` and point the host
/// directory at `host_dir`.
pub fn compose(
    config_file: &Path,
    arch: &Architecture,
    global_fragment: &str,
    host_dir: &Path,
) -> io::Result<ComposeReport> {
    let mut appended = String::from(global_fragment);
    if let Some(toolchain) = &arch.external_toolchain {
        appended.push('\n');
        appended.push_str(&external_toolchain_fragment(&arch.name, toolchain));
    }
    if !arch.extra_options.is_empty() {
        appended.push_str(&options_fragment(&arch.name, &arch.extra_options));
    }

    {
        let mut file = OpenOptions::new().append(true).open(config_file)?;
        file.write_all(appended.as_bytes())?;
        file.flush()?;
    }

    let content = std::fs::read_to_string(config_file)?;
    let host_dir_rewritten = match rewrite_host_dir(&content, host_dir) {
        Some(rewritten) => {
            std::fs::write(config_file, rewritten)?;
            true
        }
        None => {
            tracing::warn!(arch = %arch.name, "no BR2_HOST_DIR line in composed configuration");
            false
        }
    };

    Ok(ComposeReport {
        external_toolchain: arch.external_toolchain.clone(),
        extra_options: arch.extra_options.clone(),
        host_dir_rewritten,
    })
}

/// `make olddefconfig` in the build directory.
pub fn merge_command(build_dir: &Path) -> CommandSpec {
    CommandSpec::new("make").arg("olddefconfig").current_dir(build_dir)
}
