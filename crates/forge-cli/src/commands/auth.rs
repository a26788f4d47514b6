//! Registry credentials

use colored::Colorize;
use dialoguer::Password;
use forge_core::{RegistryHandle, clear_token, store_token};
use std::path::Path;

use crate::error::{CliError, Result};

/// Run the login command
pub fn run_login(root: &Path, token: Option<String>) -> Result<()> {
    let handle = RegistryHandle::discover(root)?;
    let token = match token {
        Some(token) => token,
        None => Password::new().with_prompt("Registry token").interact()?,
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(CliError::user("token must not be empty"));
    }

    store_token(&handle, token)?;
    println!(
        "{} Token stored in {}",
        "Logged in.".green().bold(),
        handle.user_config_path().display()
    );
    if std::env::var(forge_core::auth::TOKEN_ENV).is_ok() {
        println!(
            "{} {} is set and takes precedence over the stored token",
            "note:".yellow().bold(),
            forge_core::auth::TOKEN_ENV
        );
    }
    Ok(())
}

/// Run the logout command
pub fn run_logout(root: &Path) -> Result<()> {
    let handle = RegistryHandle::discover(root)?;
    if clear_token(&handle)? {
        println!("{} Stored token removed.", "Logged out.".green().bold());
    } else {
        println!("No stored token.");
    }
    Ok(())
}
