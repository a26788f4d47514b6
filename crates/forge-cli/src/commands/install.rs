//! Global tier maintenance

use colored::Colorize;
use forge_meta::{ArtifactKind, parse_version};
use std::path::Path;

use super::open;
use crate::error::Result;

/// Run the install command
pub fn run_install(root: &Path, kind: ArtifactKind, reference: &str) -> Result<()> {
    let resolved = open(root)?.install(kind, reference)?;
    println!(
        "{} {} {}@{} (from the {} tier)",
        "Installed".green().bold(),
        kind,
        resolved.name().cyan(),
        resolved.version,
        resolved.source_tier
    );
    Ok(())
}

/// Run the uninstall command
pub fn run_uninstall(root: &Path, kind: ArtifactKind, name: &str, version: &str) -> Result<()> {
    let version = parse_version(version)?;
    open(root)?.uninstall(kind, name, &version)?;
    println!("{} {} {}@{}", "Removed".green().bold(), kind, name.cyan(), version);
    Ok(())
}
