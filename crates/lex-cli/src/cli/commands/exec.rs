//! Exec command handler: one turn, streamed to stdout.
//!
//! # Output contract
//! - Assistant text → stdout, incrementally as chunks arrive
//! - Tool lifecycle and errors → stderr

use std::io::{Stderr, Stdout, Write, stderr, stdout};

use anyhow::{Context, Result, anyhow};
use lex_core::backend::{BackendClient, StreamEvent};
use lex_core::config::Config;
use lex_core::core::chat::{ChatEngine, run_turn};
use lex_core::core::events::{TurnEvent, TurnOutcome, create_event_channel};
use lex_core::core::interrupt::{self, InterruptedError};
use lex_core::core::transcript::Message;
use tokio_util::sync::CancellationToken;

pub async fn run(prompt: &str, config: &Config) -> Result<()> {
    let client = BackendClient::new(config.effective_backend_url()?);
    let mut engine = ChatEngine::new();
    engine.submit(prompt).context("open turn")?;

    let (tx, mut rx) = create_event_channel();
    let cancel = CancellationToken::new();

    // Ctrl+C cancels the turn; the read loop answers with Canceled.
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            interrupt::wait_for_interrupt().await;
            cancel.cancel();
        })
    };

    let turn = tokio::spawn(run_turn(
        client,
        prompt.to_string(),
        engine.session_id().to_string(),
        config.idle_timeout(),
        cancel,
        tx,
    ));

    let mut renderer = ExecRenderer::new();
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        renderer.on_event(&event);
        if let Some(o) = engine.apply(event) {
            outcome = Some(o);
        }
        renderer.print_new_text(&engine);
    }

    watcher.abort();
    let _ = turn.await;
    renderer.finish();

    match outcome {
        None | Some(TurnOutcome::Completed) => Ok(()),
        Some(TurnOutcome::Errored { message }) => Err(anyhow!(message)),
        Some(TurnOutcome::Canceled) => Err(InterruptedError.into()),
    }
}

/// Renderer that writes turn events to stdout/stderr.
struct ExecRenderer {
    stdout: Stdout,
    stderr: Stderr,
    /// Bytes of the active assistant message already written to stdout.
    printed: usize,
    needs_final_newline: bool,
}

impl ExecRenderer {
    fn new() -> Self {
        Self {
            stdout: stdout(),
            stderr: stderr(),
            printed: 0,
            needs_final_newline: false,
        }
    }

    fn on_event(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::Event(StreamEvent::ToolUse { name }) => {
                let _ = write!(self.stderr, "⚙ Running {name}...");
                let _ = self.stderr.flush();
            }
            TurnEvent::Event(StreamEvent::ToolOutput { .. }) => {
                let _ = writeln!(self.stderr, " Done.");
            }
            TurnEvent::Canceled => {
                let _ = writeln!(self.stderr, "\n^C Interrupted.");
            }
            _ => {}
        }
    }

    /// Prints any assistant text appended since the last call.
    fn print_new_text(&mut self, engine: &ChatEngine) {
        let Some(Message::Assistant { content, .. }) = engine
            .transcript()
            .messages()
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
        else {
            return;
        };
        if content.len() > self.printed {
            let _ = write!(self.stdout, "{}", &content[self.printed..]);
            let _ = self.stdout.flush();
            self.printed = content.len();
            self.needs_final_newline = true;
        }
    }

    fn finish(&mut self) {
        if self.needs_final_newline {
            let _ = writeln!(self.stdout);
            self.needs_final_newline = false;
        }
    }
}
