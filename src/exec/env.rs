//! Immutable environment overlays and a read-only snapshot of the host
//! environment.
//!
//! The process environment is never mutated. Every command gets an
//! [`EnvOverlay`] layered on top of whatever the child inherits.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A set of variable bindings applied to a child process.
///
/// Every builder method consumes the overlay and returns a new one, so an
/// overlay handed to a command can never change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Prepend `dir` to `PATH`. The overlay's own `PATH` wins over `base_path`
    /// so repeated calls stack.
    pub fn with_path_prepended(self, dir: &Path, base_path: Option<&str>) -> Self {
        self.with_paths_prepended(std::slice::from_ref(&dir.to_path_buf()), base_path)
    }

    /// Prepend several directories to `PATH`, keeping their order.
    pub fn with_paths_prepended(self, dirs: &[PathBuf], base_path: Option<&str>) -> Self {
        let current = self
            .vars
            .get("PATH")
            .cloned()
            .or_else(|| base_path.map(str::to_string));

        let mut parts: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
        if let Some(rest) = current.filter(|p| !p.is_empty()) {
            parts.push(rest);
        }
        self.with_var("PATH", parts.join(":"))
    }

    /// Append a whitespace-separated flag to `key`, starting from the
    /// overlay's value or else `inherited`. A flag already present is not
    /// added twice.
    pub fn with_flag(self, key: &str, flag: &str, inherited: Option<&str>) -> Self {
        let current = self
            .vars
            .get(key)
            .cloned()
            .or_else(|| inherited.map(str::to_string))
            .unwrap_or_default();

        if current.split_whitespace().any(|token| token == flag) {
            return self.with_var(key, current);
        }

        let value = if current.trim().is_empty() {
            flag.to_string()
        } else {
            format!("{} {}", current.trim_end(), flag)
        };
        self.with_var(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Install the bindings on a command about to be spawned.
    pub fn apply(&self, command: &mut Command) {
        command.envs(self.vars.iter());
    }
}

/// Snapshot of the variables this process was started with.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    vars: BTreeMap<String, String>,
}

impl HostEnv {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up an executable on this snapshot's `PATH`.
    pub fn find_program(&self, name: &str) -> Option<PathBuf> {
        let path = self.get("PATH")?;
        std::env::split_paths(path)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_path_prepend_uses_base_when_unset() {
        let env = EnvOverlay::new().with_path_prepended(Path::new("/tc/bin"), Some("/usr/bin"));
        assert_eq!(env.get("PATH"), Some("/tc/bin:/usr/bin"));
    }

    #[test]
    fn test_path_prepend_stacks_on_overlay() {
        let env = EnvOverlay::new()
            .with_path_prepended(Path::new("/a"), Some("/usr/bin"))
            .with_path_prepended(Path::new("/b"), Some("/usr/bin"));
        assert_eq!(env.get("PATH"), Some("/b:/a:/usr/bin"));
    }

    #[test]
    fn test_paths_prepended_keeps_order() {
        let dirs = vec![PathBuf::from("/one"), PathBuf::from("/two")];
        let env = EnvOverlay::new().with_paths_prepended(&dirs, None);
        assert_eq!(env.get("PATH"), Some("/one:/two"));
    }

    #[test]
    fn test_flag_appends_to_inherited() {
        let env = EnvOverlay::new().with_flag("CFLAGS", "-fno-lto", Some("-O2"));
        assert_eq!(env.get("CFLAGS"), Some("-O2 -fno-lto"));
    }

    #[test]
    fn test_flag_is_not_duplicated() {
        let env = EnvOverlay::new()
            .with_flag("LDFLAGS", "-latomic", None)
            .with_flag("LDFLAGS", "-latomic", None);
        assert_eq!(env.get("LDFLAGS"), Some("-latomic"));

        let env = EnvOverlay::new().with_flag("LDFLAGS", "-latomic", Some("-L/x -latomic"));
        assert_eq!(env.get("LDFLAGS"), Some("-L/x -latomic"));
    }

    #[test]
    fn test_overlay_values_are_independent() {
        let base = EnvOverlay::new().with_var("A", "1");
        let derived = base.clone().with_var("A", "2");
        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(derived.get("A"), Some("2"));
    }

    #[test]
    fn test_find_program_on_path() {
        let dir = tempdir().unwrap();
        let tool = dir.path().join("ccache");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let host = HostEnv::from_pairs([("PATH", dir.path().display().to_string())]);
        assert_eq!(host.find_program("ccache"), Some(tool));
        assert!(host.find_program("missing-tool").is_none());
    }

    #[test]
    fn test_find_program_without_path() {
        let host = HostEnv::from_pairs(Vec::<(String, String)>::new());
        assert!(host.find_program("ccache").is_none());
    }
}
