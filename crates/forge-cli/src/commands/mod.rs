//! Command implementations for forge-cli

pub mod auth;
pub mod cache;
pub mod fork;
pub mod install;
pub mod lock;
pub mod resolve;

pub use auth::{run_login, run_logout};
pub use cache::run_cache_clear;
pub use fork::{run_fork, run_merge, run_outdated};
pub use install::{run_install, run_uninstall};
pub use lock::{run_lock, run_verify};
pub use resolve::{run_info, run_list, run_resolve};

use forge_core::Forge;
use serde::Serialize;
use std::path::Path;

use crate::error::Result;

/// Open a resolution session for the project at `root`.
pub(crate) fn open(root: &Path) -> Result<Forge> {
    Ok(Forge::open(root)?)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
