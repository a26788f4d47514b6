//! Interactive conflict resolution for `forge merge`
//!
//! Uses dialoguer for terminal prompts and similar for the side-by-side
//! field diff.

use colored::Colorize;
use dialoguer::{Confirm, Input, Select};
use forge_core::{Conflict, ConflictResolutionStrategy, MergeOutcome, Resolution};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::commands::fork::describe;

/// Asks the user about every conflicting field.
///
/// A prompt that cannot be shown (no terminal, interrupted) aborts the
/// merge, leaving the fork untouched.
pub struct DialoguerStrategy {
    name: String,
}

impl DialoguerStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn aborted(&self, error: dialoguer::Error) -> forge_core::Error {
        tracing::warn!(error = %error, "prompt failed, aborting merge");
        forge_core::Error::MergeAborted {
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    KeepLocal,
    KeepUpstream,
    Combine,
    Edit,
    Abort,
}

impl Choice {
    fn label(self) -> &'static str {
        match self {
            Self::KeepLocal => "Keep local",
            Self::KeepUpstream => "Take upstream",
            Self::Combine => "Combine both",
            Self::Edit => "Enter a value",
            Self::Abort => "Abort merge",
        }
    }
}

fn choices(conflict: &Conflict) -> Vec<Choice> {
    let mut choices = vec![Choice::KeepLocal, Choice::KeepUpstream];
    if conflict.is_combinable() {
        choices.push(Choice::Combine);
    }
    choices.extend([Choice::Edit, Choice::Abort]);
    choices
}

fn render(value: Option<&Value>) -> String {
    match value {
        None => "(absent)\n".to_string(),
        Some(value) => {
            let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            text.push('\n');
            text
        }
    }
}

/// Line diff from the local value to the upstream value.
fn diff_lines(local: Option<&Value>, upstream: Option<&Value>) -> Vec<(ChangeTag, String)> {
    let old = render(local);
    let new = render(upstream);
    TextDiff::from_lines(&old, &new)
        .iter_all_changes()
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_manual(text: &str) -> Value {
    let text = text.trim();
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn print_conflict(conflict: &Conflict) {
    println!();
    println!("{} {}", "Conflict in".yellow().bold(), conflict.field.bold());
    println!("  {} {}", "base:".dimmed(), render(conflict.base.as_ref()).trim_end());
    for (tag, line) in diff_lines(conflict.local.as_ref(), conflict.upstream.as_ref()) {
        match tag {
            ChangeTag::Delete => println!("  {}", format!("- {line}").red()),
            ChangeTag::Insert => println!("  {}", format!("+ {line}").green()),
            ChangeTag::Equal => println!("    {line}"),
        }
    }
    println!("  {} local   {} upstream", "-".red(), "+".green());
}

impl ConflictResolutionStrategy for DialoguerStrategy {
    fn resolve(&mut self, conflict: &Conflict) -> forge_core::Result<Resolution> {
        print_conflict(conflict);

        let choices = choices(conflict);
        let labels: Vec<&str> = choices.iter().map(|c| c.label()).collect();
        let index = Select::new()
            .with_prompt(format!("Resolve '{}'", conflict.field))
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| self.aborted(e))?;

        Ok(match choices[index] {
            Choice::KeepLocal => Resolution::KeepLocal,
            Choice::KeepUpstream => Resolution::KeepUpstream,
            Choice::Combine => Resolution::Combine,
            Choice::Abort => Resolution::Abort,
            Choice::Edit => {
                let text: String = Input::new()
                    .with_prompt("New value (JSON or plain text)")
                    .interact_text()
                    .map_err(|e| self.aborted(e))?;
                Resolution::Manual(parse_manual(&text))
            }
        })
    }

    fn confirm(&mut self, outcome: &MergeOutcome) -> forge_core::Result<bool> {
        println!();
        println!(
            "{} {} -> {}",
            "Ready to merge".bold(),
            outcome.from_version,
            outcome.to_version
        );
        for field in &outcome.applied {
            println!("  {} {}", "updated".green(), field);
        }
        for (field, resolution) in &outcome.resolved {
            println!("  {} {} ({})", "resolved".yellow(), field, describe(resolution));
        }

        Confirm::new()
            .with_prompt(format!("Write the merged definition for '{}'?", self.name))
            .default(true)
            .interact()
            .map_err(|e| self.aborted(e))
    }
}
