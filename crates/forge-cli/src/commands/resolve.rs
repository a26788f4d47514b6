//! Resolve, info and list commands

use colored::Colorize;
use forge_core::{ArtifactListing, ResolvedArtifact};
use forge_meta::{ArtifactKind, Tier};
use std::path::Path;

use super::{open, print_json};
use crate::error::Result;

/// Run the resolve command
pub fn run_resolve(root: &Path, kind: ArtifactKind, reference: &str, json: bool) -> Result<()> {
    let resolved = open(root)?.resolve(kind, reference)?;
    if json {
        return print_json(&resolved);
    }
    print_resolved(&resolved);
    Ok(())
}

pub(crate) fn print_resolved(resolved: &ResolvedArtifact) {
    println!(
        "{} {} {}@{} from the {} tier",
        "Resolved".green().bold(),
        resolved.kind,
        resolved.name().cyan(),
        resolved.version,
        resolved.source_tier.to_string().bold()
    );
    if let Some(description) = &resolved.definition.description {
        println!("  {description}");
    }
    println!("  {}", resolved.integrity_hash.dimmed());
}

/// Run the info command
pub fn run_info(root: &Path, kind: ArtifactKind, reference: &str, json: bool) -> Result<()> {
    let info = open(root)?.artifact_info(kind, reference)?;
    if json {
        return print_json(&info);
    }

    println!("{} {}", info.name.cyan().bold(), info.version);
    println!("  {:<12} {}", "kind:".dimmed(), info.kind);
    println!("  {:<12} {}", "tier:".dimmed(), info.tier);
    println!("  {:<12} {}", "integrity:".dimmed(), info.integrity_hash);
    if let Some(description) = &info.description {
        println!("  {:<12} {}", "description:".dimmed(), description);
    }

    if let Some(manifest) = &info.manifest {
        println!();
        println!("{}", "Manifest".bold());
        if let Some(latest) = &manifest.latest {
            println!("  {:<12} {}", "latest:".dimmed(), latest);
        }
        if !manifest.installed_versions.is_empty() {
            println!("  {:<12} {}", "installed:".dimmed(), manifest.installed_versions.join(", "));
        }
        if !manifest.deprecated.is_empty() {
            println!("  {:<12} {}", "deprecated:".dimmed(), manifest.deprecated.join(", ").yellow());
        }
        if let Some(origin) = &manifest.fork_of {
            println!("  {:<12} {}@{}", "fork of:".dimmed(), origin.name, origin.version);
        }
        if !manifest.forks.is_empty() {
            println!("  {:<12} {}", "forks:".dimmed(), manifest.forks.join(", "));
        }
        if manifest.update_available {
            println!("  {}", "update available".yellow().bold());
        }
    }
    Ok(())
}

/// Run the list command
pub fn run_list(root: &Path, kind: ArtifactKind, tier: Option<Tier>, json: bool) -> Result<()> {
    let listings = open(root)?.list(kind, tier)?;
    if json {
        return print_json(&listings);
    }

    if listings.is_empty() {
        println!("No {} found.", kind.dir_name());
        return Ok(());
    }

    for tier in [Tier::Local, Tier::Global, Tier::Remote] {
        let rows: Vec<&ArtifactListing> = listings.iter().filter(|l| l.tier == tier).collect();
        if rows.is_empty() {
            continue;
        }
        println!("{}:", tier.to_string().cyan().bold());
        for row in rows {
            println!(
                "  {:<24} {:<10} {}",
                row.name.green(),
                row.version.as_deref().unwrap_or("-"),
                row.description.as_deref().unwrap_or("").dimmed()
            );
        }
        println!();
    }

    println!("{} {} {}", "Total:".dimmed(), listings.len(), kind.dir_name());
    Ok(())
}
