//! TUI runtime - owns the terminal, runs the event loop, executes effects.
//!
//! The reducer stays pure and produces effects; this module executes them.
//! All turn events arrive over the turn task's channel and are applied to
//! the engine from this loop only, preserving byte-stream order.

use std::io::Stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyEventKind};
use lex_core::core::chat::run_turn;
use lex_core::core::events::{TurnEvent, create_event_channel};
use lex_core::core::interrupt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio_util::sync::CancellationToken;

use crate::render;
use crate::state::{AppState, TurnTask};
use crate::update::{UiEffect, UiEvent, update};

/// Poll cadence while a turn is streaming.
pub const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Poll cadence when idle; longer to reduce CPU usage.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Full-screen TUI runtime.
pub struct TuiRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: AppState,
}

impl TuiRuntime {
    pub fn new(terminal: Terminal<CrosstermBackend<Stdout>>, state: AppState) -> Self {
        Self { terminal, state }
    }

    /// Runs the main event loop until quit.
    ///
    /// # Errors
    /// Returns an error if terminal I/O fails.
    pub fn run(&mut self) -> Result<()> {
        while !self.state.should_quit {
            // Ctrl+C while a turn streams cancels the turn; when idle it
            // quits. The signal handler only sets a flag (renderer owns the
            // terminal), so it is consumed here.
            if interrupt::is_interrupted() {
                interrupt::reset();
                if self.state.engine.is_busy() {
                    self.execute_effect(UiEffect::CancelTurn);
                } else {
                    break;
                }
            }

            let events = self.collect_events()?;
            for event in events {
                let effects = update(&mut self.state, event);
                for effect in effects {
                    self.execute_effect(effect);
                }
            }

            self.terminal.draw(|frame| render::render(&self.state, frame))?;
        }

        // Leaving with a turn in flight: stop its reads and release the
        // connection.
        if let Some(task) = &self.state.turn_task {
            task.cancel.cancel();
        }
        Ok(())
    }

    /// Collects events from the turn channel and the terminal.
    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = vec![UiEvent::Tick];

        let mut task_gone = false;
        if let Some(task) = &mut self.state.turn_task {
            use tokio::sync::mpsc::error::TryRecvError;
            loop {
                match task.rx.try_recv() {
                    Ok(event) => events.push(UiEvent::Turn(event)),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        // The read loop is gone; if no terminal event made it
                        // through, treat it as a closed stream.
                        task_gone = true;
                        events.push(UiEvent::Turn(TurnEvent::Closed));
                        break;
                    }
                }
            }
        }
        if task_gone {
            self.state.turn_task = None;
        }

        let tick = if self.state.engine.is_busy() {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };
        if crossterm::event::poll(tick)? {
            match crossterm::event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    events.push(UiEvent::Key(key));
                }
                Event::Resize(_, _) => events.push(UiEvent::Resize),
                _ => {}
            }
        }

        Ok(events)
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => self.state.should_quit = true,
            UiEffect::CancelTurn => {
                if let Some(task) = &self.state.turn_task {
                    task.cancel.cancel();
                }
            }
            UiEffect::Submit { query } => self.start_turn(query),
        }
    }

    fn start_turn(&mut self, query: String) {
        match self.state.engine.submit(&query) {
            Ok(()) => {
                tracing::debug!(chars = query.len(), "starting turn");
                let (tx, rx) = create_event_channel();
                let cancel = CancellationToken::new();
                tokio::spawn(run_turn(
                    self.state.client.clone(),
                    query,
                    self.state.engine.session_id().to_string(),
                    self.state.idle_timeout,
                    cancel.clone(),
                    tx,
                ));
                self.state.turn_task = Some(TurnTask { rx, cancel });
                self.state.scroll.scroll_to_bottom();
            }
            Err(err) => self.state.set_notice(err.to_string()),
        }
    }
}
