//! Config command handlers.

use anyhow::Result;
use lex_core::config::paths;

pub fn path() -> Result<()> {
    println!("{}", paths::config_path().display());
    Ok(())
}
