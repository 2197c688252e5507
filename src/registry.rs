//! Architecture registry, loaded from the project's plain-text config files.
//!
//! | File                           | Line format                      |
//! |--------------------------------|----------------------------------|
//! | `architectures.conf`           | `name:defconfig`                 |
//! | `external-toolchains.conf`     | `name:toolchain-config-name`     |
//! | `arch-buildroot-options.conf`  | `name:OPTION=1,OPTION_B=y`       |
//!
//! Blank lines and `#` comments are ignored everywhere. Only
//! `architectures.conf` is required.

use crate::config::BuildPaths;
use crate::errors::BuildError;
use crate::quirks::{ArchQuirk, quirks_for};
use std::collections::HashMap;
use std::path::Path;

/// One target architecture. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Architecture {
    pub name: String,
    pub defconfig: String,
    pub external_toolchain: Option<String>,
    pub extra_options: Vec<String>,
}

impl Architecture {
    pub fn new(name: impl Into<String>, defconfig: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defconfig: defconfig.into(),
            external_toolchain: None,
            extra_options: Vec::new(),
        }
    }

    pub fn with_external_toolchain(mut self, toolchain: impl Into<String>) -> Self {
        self.external_toolchain = Some(toolchain.into());
        self
    }

    pub fn with_extra_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn quirks(&self) -> &'static [ArchQuirk] {
        quirks_for(&self.name)
    }
}

/// `key:value` pairs from a config file, in file order.
fn parse_pairs(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn read_optional(path: &Path) -> Result<Option<String>, BuildError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BuildError::configuration(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Insertion-ordered set of architectures.
#[derive(Debug, Clone, Default)]
pub struct ArchRegistry {
    archs: Vec<Architecture>,
}

impl ArchRegistry {
    /// Build a registry from file contents. A later duplicate name replaces the
    /// defconfig of the earlier entry but keeps its position.
    pub fn parse(architectures: &str, external_toolchains: &str, extra_options: &str) -> Self {
        let mut registry = Self::default();
        for (name, defconfig) in parse_pairs(architectures) {
            registry.insert(Architecture::new(name, defconfig));
        }

        let toolchains: HashMap<String, String> = parse_pairs(external_toolchains)
            .into_iter()
            .filter(|(_, tc)| !tc.is_empty())
            .collect();
        let options: HashMap<String, Vec<String>> = parse_pairs(extra_options)
            .into_iter()
            .map(|(name, list)| {
                let opts = list
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                (name, opts)
            })
            .collect();

        for arch in &mut registry.archs {
            arch.external_toolchain = toolchains.get(&arch.name).cloned();
            if let Some(opts) = options.get(&arch.name) {
                arch.extra_options = opts.clone();
            }
        }
        registry
    }

    /// Load the registry from the project directory.
    pub fn load(paths: &BuildPaths) -> Result<Self, BuildError> {
        let archs = read_optional(&paths.architectures_file)?.ok_or_else(|| {
            BuildError::configuration(format!(
                "Architecture configuration not found: {}",
                paths.architectures_file.display()
            ))
        })?;
        let toolchains = read_optional(&paths.external_toolchains_file)?.unwrap_or_default();
        let options = read_optional(&paths.arch_options_file)?.unwrap_or_default();

        let registry = Self::parse(&archs, &toolchains, &options);
        tracing::debug!(count = registry.len(), "loaded architecture registry");
        Ok(registry)
    }

    fn insert(&mut self, arch: Architecture) {
        match self.archs.iter_mut().find(|a| a.name == arch.name) {
            Some(existing) => existing.defconfig = arch.defconfig,
            None => self.archs.push(arch),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Architecture> {
        self.archs.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Architecture> {
        self.archs.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.archs.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.archs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archs.is_empty()
    }

    /// Resolve requested names, keeping request order. An empty request means
    /// every registered architecture.
    pub fn select(&self, requested: &[String]) -> Result<Vec<Architecture>, BuildError> {
        if requested.is_empty() {
            return Ok(self.archs.clone());
        }
        requested
            .iter()
            .map(|name| {
                self.get(name).cloned().ok_or_else(|| {
                    BuildError::configuration(format!(
                        "Unknown architecture '{}'. Available: {}",
                        name,
                        self.names().join(", ")
                    ))
                })
            })
            .collect()
    }
}
