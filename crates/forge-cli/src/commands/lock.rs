//! Lockfile commands

use colored::Colorize;
use forge_meta::{ArtifactKind, ArtifactReference};
use std::path::Path;

use super::open;
use crate::error::Result;

/// Run the lock command
pub fn run_lock(root: &Path, kind: Option<ArtifactKind>, references: &[String]) -> Result<()> {
    let roots = match kind {
        Some(kind) => references
            .iter()
            .map(|r| Ok((kind, ArtifactReference::parse(r)?)))
            .collect::<std::result::Result<Vec<_>, forge_meta::Error>>()?,
        None => Vec::new(),
    };

    let forge = open(root)?;
    let lockfile = forge.generate_lockfile(&roots)?;

    for (kind, name, entry) in lockfile.iter() {
        println!(
            "  {} {:<6} {:<24} {:<10} {}",
            "+".green(),
            kind.as_str(),
            name,
            entry.version,
            entry.resolved_tier.to_string().dimmed()
        );
    }
    println!(
        "{} {} artifact(s) pinned in {}",
        "Locked".green().bold(),
        lockfile.len(),
        forge.handle().lockfile_path().display()
    );
    Ok(())
}

/// Run the verify command
pub fn run_verify(root: &Path) -> Result<()> {
    let verified = open(root)?.verify_lockfile()?;
    for resolved in &verified {
        println!(
            "  {} {:<6} {}@{}",
            "ok".green(),
            resolved.kind.as_str(),
            resolved.name(),
            resolved.version
        );
    }
    println!("{} {} artifact(s) match the lockfile", "Verified".green().bold(), verified.len());
    Ok(())
}
