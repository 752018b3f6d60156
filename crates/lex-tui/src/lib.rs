//! Full-screen chat TUI for Lex.

pub mod render;
pub mod renderers;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

use std::io::IsTerminal;

use anyhow::Result;
use lex_core::backend::BackendClient;
use lex_core::config::Config;
use lex_core::core::interrupt;

use crate::runtime::TuiRuntime;
use crate::state::AppState;

/// Runs the interactive chat loop.
///
/// # Errors
/// Returns an error if stdout is not a terminal, the backend URL is
/// invalid, or terminal I/O fails.
pub fn run_interactive_chat(config: &Config) -> Result<()> {
    if !std::io::stdout().is_terminal() {
        anyhow::bail!(
            "Chat mode requires a terminal.\n\
             Use `lex exec --prompt '...'` for non-interactive execution."
        );
    }

    let client = BackendClient::new(config.effective_backend_url()?);

    // Set up panic hook BEFORE entering the alternate screen.
    terminal::install_panic_hook();
    interrupt::set_restore_hook(|| {
        let _ = terminal::restore_terminal();
    });
    interrupt::reset();

    let term = terminal::setup_terminal()?;
    let mut runtime = TuiRuntime::new(term, AppState::new(client, config.idle_timeout()));

    let result = runtime.run();
    let _ = terminal::restore_terminal();
    result
}
