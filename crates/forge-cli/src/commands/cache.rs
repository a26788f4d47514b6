//! Cache maintenance

use colored::Colorize;
use std::path::Path;

use super::open;
use crate::error::Result;

/// Run the cache clear command
pub fn run_cache_clear(root: &Path, key: Option<&str>) -> Result<()> {
    let removed = open(root)?.invalidate_cache(key)?;
    match key {
        Some(key) => println!("{} {} ({} entr{})", "Cleared".green().bold(), key, removed, plural(removed)),
        None => println!("{} {} cache entr{}", "Cleared".green().bold(), removed, plural(removed)),
    }
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}
