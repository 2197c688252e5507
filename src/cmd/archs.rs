//! Architecture listing — `build-tool list-archs`.

use anyhow::Result;
use build_tool::registry::ArchRegistry;
use build_tool::ui::icons::FOLDER;
use console::style;
use std::collections::BTreeSet;

use super::Workspace;

/// One row per registered architecture, sorted by name.
pub(crate) fn arch_rows(registry: &ArchRegistry, built: &BTreeSet<String>) -> Vec<String> {
    let mut archs: Vec<_> = registry.iter().collect();
    archs.sort_by(|a, b| a.name.cmp(&b.name));
    archs
        .into_iter()
        .map(|arch| {
            let status = if built.contains(&arch.name) {
                "Built"
            } else {
                "Not built"
            };
            format!("{:<15} {:<40} {:<10}", arch.name, arch.defconfig, status)
        })
        .collect()
}

pub fn cmd_list_archs(ws: &Workspace) -> Result<()> {
    let registry = ArchRegistry::load(&ws.paths)?;
    let built: BTreeSet<String> = ws.paths.available_toolchains().into_iter().collect();

    println!("{}", style("Available Architectures:").bold());
    println!();
    println!("{:<15} {:<40} {:<10}", "Architecture", "Defconfig", "Toolchain");
    println!("{}", "-".repeat(70));
    for row in arch_rows(&registry, &built) {
        println!("{}", row.trim_end());
    }
    println!();
    println!("{}Toolchains directory: {}", FOLDER, ws.paths.toolchains_dir.display());
    Ok(())
}
