//! Integration tests for build-tool
//!
//! These drive the binary against a scratch project directory with a fake
//! `make` on PATH, so no real Buildroot tree is needed.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const STOP_MESSAGE: &str = "Stopping due to failure";

/// Fake `make`: `*_defconfig` targets write `$O/.config`, `broken_defconfig`
/// fails with exit code 2, everything else succeeds.
const FAKE_MAKE: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do
    case "$arg" in
        O=*) out="${arg#O=}" ;;
        broken_defconfig) echo "no such defconfig" >&2; exit 2 ;;
    esac
done
if [ -n "$out" ]; then
    printf 'BR2_HOST_DIR="$(BASE_DIR)/host"\n' > "$out/.config"
fi
echo "make $*"
exit 0
"#;

fn build_tool() -> Command {
    cargo_bin_cmd!("build-tool")
}

/// A project with architectures `a`, `b` (broken defconfig) and `c`, plus a
/// Buildroot source directory and a bin directory holding the fake `make`.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("architectures.conf"),
            "# name:defconfig\na:a_defconfig\nb:broken_defconfig\nc:c_defconfig\n",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src/buildroot")).unwrap();
        fs::create_dir_all(dir.path().join("src/binutils-gdb")).unwrap();

        let bin = dir.path().join("fakebin");
        fs::create_dir_all(&bin).unwrap();
        write_executable(&bin.join("make"), FAKE_MAKE);
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn buildroot_src(&self) -> String {
        self.path().join("src/buildroot").display().to_string()
    }

    fn cmd(&self) -> Command {
        let fake_path = match std::env::var("PATH") {
            Ok(path) => format!("{}:{}", self.path().join("fakebin").display(), path),
            Err(_) => self.path().join("fakebin").display().to_string(),
        };
        let mut cmd = build_tool();
        cmd.current_dir(self.path())
            .env("PATH", fake_path)
            .env_remove("BUILD_TOOL_LOG");
        cmd
    }

    fn status_file(&self) -> String {
        fs::read_to_string(self.path().join("toolchains/build-status.txt")).unwrap()
    }
}

fn write_executable(path: &Path, contents: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, contents).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        build_tool()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build-toolchains"))
            .stdout(predicate::str::contains("build-gdb"))
            .stdout(predicate::str::contains("list-archs"));
    }

    #[test]
    fn test_version() {
        build_tool().arg("--version").assert().success();
    }

    #[test]
    fn test_list_archs_shows_status() {
        let project = Project::new();
        fs::create_dir_all(project.path().join("toolchains/c")).unwrap();

        project
            .cmd()
            .arg("list-archs")
            .assert()
            .success()
            .stdout(predicate::str::contains("Available Architectures:"))
            .stdout(predicate::str::is_match(r"a\s+a_defconfig\s+Not built").unwrap())
            .stdout(predicate::str::is_match(r"c\s+c_defconfig\s+Built").unwrap());
    }

    #[test]
    fn test_list_archs_without_registry_fails() {
        let dir = TempDir::new().unwrap();
        build_tool()
            .current_dir(dir.path())
            .arg("list-archs")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Architecture configuration not found"));
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

mod configuration_errors {
    use super::*;

    #[test]
    fn test_unknown_architecture_is_rejected() {
        let project = Project::new();
        project
            .cmd()
            .args(["build-toolchains", "-s", &project.buildroot_src(), "zzz"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown architecture 'zzz'"))
            .stderr(predicate::str::contains("a, b, c"));

        assert!(!project.path().join("builds").exists());
    }

    #[test]
    fn test_missing_buildroot_source_is_rejected() {
        let project = Project::new();
        let missing = project.path().join("nowhere").display().to_string();
        project
            .cmd()
            .args(["init-toolchains", "-s", &missing])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Buildroot source directory not found"));
    }

    #[test]
    fn test_gdb_without_toolchains_is_rejected() {
        let project = Project::new();
        let gdb_src = project.path().join("src/binutils-gdb").display().to_string();
        project
            .cmd()
            .args(["init-gdb", "-s", &gdb_src])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No toolchains found"));
    }
}

// =============================================================================
// Toolchain Batches
// =============================================================================

mod toolchain_batches {
    use super::*;

    #[test]
    fn test_init_single_arch_composes_config() {
        let project = Project::new();
        fs::write(project.path().join("buildroot-fragment.conf"), "BR2_CCACHE=y\n").unwrap();

        project
            .cmd()
            .args(["init-toolchains", "-s", &project.buildroot_src(), "a"])
            .assert()
            .success()
            .stdout(predicate::str::contains("SUCCESS: Build directory initialized for a"));

        let config = fs::read_to_string(project.path().join("builds/a/.config")).unwrap();
        let host_dir = project.path().canonicalize().unwrap().join("toolchains/a");
        assert!(config.contains(&format!("BR2_HOST_DIR=\"{}\"", host_dir.display())));
        assert!(config.contains("BR2_CCACHE=y"));
        assert!(!project.path().join("toolchains/build-status.txt").exists());
    }

    #[test]
    fn test_build_stops_on_first_failure() {
        let project = Project::new();
        project
            .cmd()
            .args(["build-toolchains", "-j", "2", "-s", &project.buildroot_src()])
            .assert()
            .failure()
            .stdout(predicate::str::contains(STOP_MESSAGE))
            .stdout(predicate::str::contains("a: SUCCESS"))
            .stdout(predicate::str::contains("b: FAILED"))
            .stdout(predicate::str::contains("c: ").not())
            .stderr(predicate::str::contains("b: configure step failed with exit code 2"));

        assert_eq!(project.status_file(), "a: SUCCESS\nb: FAILED\n");
        let log = fs::read_to_string(project.path().join("builds/a/build.log")).unwrap();
        assert!(log.contains("make -j2"));
    }

    #[test]
    fn test_build_keep_going_covers_every_arch() {
        let project = Project::new();
        project
            .cmd()
            .args(["build-toolchains", "-k", "-s", &project.buildroot_src()])
            .assert()
            .failure()
            .stdout(predicate::str::contains(STOP_MESSAGE).not());

        assert_eq!(project.status_file(), "a: SUCCESS\nb: FAILED\nc: SUCCESS\n");
    }

    #[test]
    fn test_build_succeeds_when_all_archs_pass() {
        let project = Project::new();
        project
            .cmd()
            .args(["build-toolchains", "-s", &project.buildroot_src(), "a", "c"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Build Summary"));

        assert_eq!(project.status_file(), "a: SUCCESS\nc: SUCCESS\n");
    }
}
