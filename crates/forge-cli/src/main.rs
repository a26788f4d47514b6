//! Forge CLI
//!
//! The command-line interface for resolving, locking and forking agent and
//! tool definitions.

mod cli;
mod commands;
mod error;
mod interactive;
mod logging;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

use cli::{CacheAction, Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    tracing::debug!("Verbose mode enabled");

    let root = match cli.project {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Some(cmd) => execute_command(root, cmd),
        None => {
            // No command provided - show help hint
            println!("{} artifact registry CLI", "forge".green().bold());
            println!();
            println!("Run {} for available commands.", "forge --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(root: PathBuf, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Resolve { kind, reference, json } => commands::run_resolve(&root, kind.into(), &reference, json),
        Commands::Info { kind, reference, json } => commands::run_info(&root, kind.into(), &reference, json),
        Commands::List { kind, tier, json } => commands::run_list(&root, kind.into(), tier.map(Into::into), json),
        Commands::Install { kind, reference } => commands::run_install(&root, kind.into(), &reference),
        Commands::Uninstall { kind, name, version } => commands::run_uninstall(&root, kind.into(), &name, &version),
        Commands::Lock { kind, references } => commands::run_lock(&root, kind.map(Into::into), &references),
        Commands::Verify => commands::run_verify(&root),
        Commands::Fork { kind, source, target } => commands::run_fork(&root, kind.into(), &source, &target),
        Commands::Outdated { kind, name, json } => commands::run_outdated(&root, kind.into(), &name, json),
        Commands::Merge { kind, name, policy } => commands::run_merge(&root, kind.into(), &name, policy.map(Into::into)),
        Commands::Cache {
            action: CacheAction::Clear { key },
        } => commands::run_cache_clear(&root, key.as_deref()),
        Commands::Login { token } => commands::run_login(&root, token),
        Commands::Logout => commands::run_logout(&root),
    }
}
