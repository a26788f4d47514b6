//! Fork, outdated and merge commands

use colored::Colorize;
use forge_core::{MergeOutcome, MergePolicy, PolicyStrategy, Resolution, UpstreamStatus};
use forge_meta::ArtifactKind;
use serde::Serialize;
use std::path::Path;

use super::{open, print_json};
use crate::error::Result;
use crate::interactive::DialoguerStrategy;

/// Run the fork command
pub fn run_fork(root: &Path, kind: ArtifactKind, source: &str, target: &str) -> Result<()> {
    let forge = open(root)?;
    let definition = forge.fork(kind, source, target)?;
    let origin = definition
        .fork
        .as_ref()
        .map(|f| format!("{}@{}", f.fork_of.name, f.fork_of.version))
        .unwrap_or_else(|| source.to_string());

    println!("{} {} {} from {}", "Forked".green().bold(), kind, target.cyan(), origin);
    println!(
        "  {}",
        forge.handle().local_definition_path(kind, target).display().to_string().dimmed()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutdatedReport {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream: Option<String>,
    current_version: String,
    latest_version: Option<String>,
    update_available: bool,
}

impl From<UpstreamStatus> for OutdatedReport {
    fn from(status: UpstreamStatus) -> Self {
        Self {
            name: status.name,
            upstream: Some(status.upstream),
            current_version: status.current_version.to_string(),
            latest_version: Some(status.latest_version.to_string()),
            update_available: !status.up_to_date,
        }
    }
}

/// Run the outdated command
///
/// Forks are compared against their upstream; anything else against the
/// catalog manifest.
pub fn run_outdated(root: &Path, kind: ArtifactKind, name: &str, json: bool) -> Result<()> {
    let forge = open(root)?;
    let resolved = forge.resolve(kind, name)?;

    let report = if resolved.definition.fork.is_some() {
        OutdatedReport::from(forge.check_upstream(kind, name)?)
    } else {
        let latest = forge
            .refresh_manifest(kind, name)?
            .and_then(|manifest| manifest.latest_stable());
        OutdatedReport {
            name: name.to_string(),
            upstream: None,
            current_version: resolved.version.to_string(),
            update_available: latest.as_ref().is_some_and(|l| *l > resolved.version),
            latest_version: latest.map(|v| v.to_string()),
        }
    };

    if json {
        return print_json(&report);
    }

    let subject = match &report.upstream {
        Some(upstream) => format!("{} (fork of {})", report.name.cyan(), upstream),
        None => report.name.cyan().to_string(),
    };
    match (&report.latest_version, report.update_available) {
        (Some(latest), true) => println!(
            "{} {}: {} -> {}",
            "Update available".yellow().bold(),
            subject,
            report.current_version,
            latest.green()
        ),
        (Some(_), false) => println!("{} {} is at {}", "Up to date:".green().bold(), subject, report.current_version),
        (None, _) => println!(
            "{} {} is at {}; no newer release is known",
            "Up to date:".green().bold(),
            subject,
            report.current_version
        ),
    }
    Ok(())
}

/// Run the merge command
pub fn run_merge(root: &Path, kind: ArtifactKind, name: &str, policy: Option<MergePolicy>) -> Result<()> {
    let forge = open(root)?;
    let outcome = match policy {
        Some(policy) => forge.merge_upstream(kind, name, &mut PolicyStrategy::new(policy))?,
        None => forge.merge_upstream(kind, name, &mut DialoguerStrategy::new(name))?,
    };
    print_outcome(name, &outcome);
    Ok(())
}

fn print_outcome(name: &str, outcome: &MergeOutcome) {
    if outcome.up_to_date {
        println!(
            "{} {} already tracks upstream {}",
            "Up to date:".green().bold(),
            name.cyan(),
            outcome.to_version
        );
        return;
    }

    println!(
        "{} upstream {} -> {} into {}",
        "Merged".green().bold(),
        outcome.from_version,
        outcome.to_version,
        name.cyan()
    );
    for field in &outcome.applied {
        println!("  {} {}", "updated".green(), field);
    }
    for (field, resolution) in &outcome.resolved {
        println!("  {} {} ({})", "resolved".yellow(), field, describe(resolution));
    }
}

pub(crate) fn describe(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::KeepLocal => "kept local",
        Resolution::KeepUpstream => "took upstream",
        Resolution::Combine => "combined",
        Resolution::Manual(_) => "edited",
        Resolution::Abort => "aborted",
    }
}
