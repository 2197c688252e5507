//! Interactive toolchain shell — `build-tool shell`.

use anyhow::{Context, Result};
use build_tool::config::BuildPaths;
use build_tool::cross_env::discover_cross_compiler;
use build_tool::errors::BuildError;
use build_tool::exec::{EnvOverlay, HostEnv};
use build_tool::ui::icons::{FOLDER, SHELL};
use build_tool::ui::{ConsoleSink, OutputSink};
use std::path::PathBuf;
use tokio::process::Command;

/// Toolchains usable from the shell.
#[derive(Debug, Default)]
pub(crate) struct ShellToolchains {
    pub archs: Vec<String>,
    pub bin_dirs: Vec<PathBuf>,
    /// `(arch, prefix)` for every toolchain with a discoverable compiler.
    pub prefixes: Vec<(String, String)>,
}

pub(crate) fn collect_toolchains(
    paths: &BuildPaths,
    requested: &[String],
    sink: &dyn OutputSink,
) -> Result<ShellToolchains, BuildError> {
    let archs = if requested.is_empty() {
        let available = paths.available_toolchains();
        if available.is_empty() {
            return Err(BuildError::configuration(format!(
                "No toolchains found in {}\nRun build-toolchains first",
                paths.toolchains_dir.display()
            )));
        }
        available
    } else {
        requested.to_vec()
    };

    let mut found = ShellToolchains {
        archs,
        ..Default::default()
    };
    for arch in &found.archs {
        let toolchain_dir = paths.toolchain_dir(arch);
        if !toolchain_dir.is_dir() {
            sink.warn(&format!(
                "Toolchain not found for {}: {}",
                arch,
                toolchain_dir.display()
            ));
            continue;
        }
        let bin_dir = paths.toolchain_bin_dir(arch);
        if bin_dir.is_dir() {
            if let Ok(prefix) = discover_cross_compiler(&bin_dir) {
                found.prefixes.push((arch.clone(), prefix));
            }
            found.bin_dirs.push(bin_dir);
        }
    }

    if found.bin_dirs.is_empty() {
        return Err(BuildError::configuration("No valid toolchains found"));
    }
    Ok(found)
}

/// `PATH` with every toolchain first, `BUILD_TOOL_ARCHS`, and the compiler
/// variables when exactly one architecture was asked for.
pub(crate) fn shell_overlay(toolchains: &ShellToolchains, host: &HostEnv) -> EnvOverlay {
    let mut env = EnvOverlay::new()
        .with_paths_prepended(&toolchains.bin_dirs, host.get("PATH"))
        .with_var("BUILD_TOOL_ARCHS", toolchains.archs.join(" "));

    if toolchains.archs.len() == 1
        && let Some((_, prefix)) = toolchains.prefixes.first()
    {
        env = env
            .with_var("CROSS_COMPILE", prefix.as_str())
            .with_var("CC", format!("{}-gcc", prefix))
            .with_var("CXX", format!("{}-g++", prefix))
            .with_var("AR", format!("{}-ar", prefix))
            .with_var("RANLIB", format!("{}-ranlib", prefix));
    }
    env
}

fn print_banner(toolchains: &ShellToolchains, env: &EnvOverlay) {
    let rule = "=".repeat(70);
    println!("{}", rule);
    println!("{}Build Tool Shell", SHELL);
    println!("{}", rule);
    println!("Architectures: {}", toolchains.archs.join(", "));
    println!();
    println!("{}Toolchain bin directories added to PATH:", FOLDER);
    for dir in &toolchains.bin_dirs {
        println!("  {}", dir.display());
    }
    if !toolchains.prefixes.is_empty() {
        println!();
        println!("Cross-compile prefixes:");
        for (arch, prefix) in &toolchains.prefixes {
            println!("  {}={}", arch, prefix);
        }
    }
    if toolchains.archs.len() == 1 {
        println!();
        println!("Environment variables set:");
        for key in ["CROSS_COMPILE", "CC", "CXX"] {
            println!("  {}={}", key, env.get(key).unwrap_or(""));
        }
    }
    println!();
    println!("Type 'exit' to leave this shell");
    println!("{}", rule);
    println!();
}

pub async fn cmd_shell(ws: &super::Workspace, requested: &[String]) -> Result<bool> {
    let toolchains = collect_toolchains(&ws.paths, requested, &ConsoleSink)?;
    let env = shell_overlay(&toolchains, &ws.host);
    print_banner(&toolchains, &env);

    let shell = ws.host.get("SHELL").unwrap_or("/bin/bash").to_string();
    let mut command = Command::new(&shell);
    env.apply(&mut command);
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to start shell '{}'", shell))?;

    // Ctrl-C belongs to the interactive shell; keep waiting for it to exit.
    let status = loop {
        tokio::select! {
            status = child.wait() => break status.context("Failed waiting for shell")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupt received while shell is running");
            }
        }
    };
    tracing::debug!(exit_code = ?status.code(), "shell exited");

    println!();
    println!("Exited build tool shell");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn paths_with(archs: &[(&str, Option<&str>)]) -> (tempfile::TempDir, BuildPaths) {
        let dir = tempdir().unwrap();
        let paths = BuildPaths::new(dir.path(), "/br".into(), "/gdb".into()).unwrap();
        for (arch, compiler) in archs {
            let bin = paths.toolchain_bin_dir(arch);
            std::fs::create_dir_all(&bin).unwrap();
            if let Some(name) = compiler {
                std::fs::write(bin.join(name), "").unwrap();
            }
        }
        (dir, paths)
    }

    #[test]
    fn test_single_arch_sets_compiler_vars() {
        let (_dir, paths) = paths_with(&[("arm", Some("arm-linux-gcc"))]);
        let found = collect_toolchains(&paths, &["arm".to_string()], &ConsoleSink).unwrap();
        let host = HostEnv::from_pairs([("PATH", "/usr/bin")]);
        let env = shell_overlay(&found, &host);

        let expected_path = format!("{}:/usr/bin", paths.toolchain_bin_dir("arm").display());
        assert_eq!(env.get("PATH"), Some(expected_path.as_str()));
        assert_eq!(env.get("BUILD_TOOL_ARCHS"), Some("arm"));
        assert_eq!(env.get("CROSS_COMPILE"), Some("arm-linux"));
        assert_eq!(env.get("CC"), Some("arm-linux-gcc"));
        assert_eq!(env.get("RANLIB"), Some("arm-linux-ranlib"));
    }

    #[test]
    fn test_multiple_archs_skip_compiler_vars_and_missing_ones() {
        let (_dir, paths) = paths_with(&[("arm", Some("arm-linux-gcc")), ("mips", None)]);
        let requested = vec!["arm".to_string(), "mips".to_string(), "sh4".to_string()];
        let found = collect_toolchains(&paths, &requested, &ConsoleSink).unwrap();

        assert_eq!(found.bin_dirs.len(), 2);
        assert_eq!(found.prefixes, vec![("arm".to_string(), "arm-linux".to_string())]);

        let env = shell_overlay(&found, &HostEnv::default());
        assert_eq!(env.get("BUILD_TOOL_ARCHS"), Some("arm mips sh4"));
        assert!(env.get("CROSS_COMPILE").is_none());
    }

    #[test]
    fn test_no_toolchains_is_error() {
        let (_dir, paths) = paths_with(&[]);
        let err = collect_toolchains(&paths, &[], &ConsoleSink).unwrap_err();
        assert!(err.to_string().contains("No toolchains found"));

        let err = collect_toolchains(&paths, &["arm".to_string()], &ConsoleSink).unwrap_err();
        assert!(err.to_string().contains("No valid toolchains found"));
    }
}
