//! Chat command handler.

use anyhow::{Context, Result};
use lex_core::config::Config;

pub fn run(config: &Config) -> Result<()> {
    lex_tui::run_interactive_chat(config).context("run chat")
}
