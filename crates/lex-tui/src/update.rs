//! Event reducer.
//!
//! `update` mutates state and returns effects; the runtime executes them.
//! All transcript mutation goes through the chat engine here, on the single
//! consumer side of the turn event channel.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lex_core::core::events::{TurnEvent, TurnOutcome};

use crate::state::AppState;

/// Events fed to the reducer.
#[derive(Debug)]
pub enum UiEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    Turn(TurnEvent),
}

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug, PartialEq, Eq)]
pub enum UiEffect {
    /// Open a turn for the given query and spawn its read loop.
    Submit { query: String },
    /// Cancel the in-flight turn.
    CancelTurn,
    /// Quit the application.
    Quit,
}

pub fn update(state: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Key(key) => handle_key(state, key),
        UiEvent::Resize => Vec::new(),
        UiEvent::Tick => {
            state.spinner_frame = state.spinner_frame.wrapping_add(1);
            state.expire_notice();
            Vec::new()
        }
        UiEvent::Turn(turn_event) => handle_turn_event(state, turn_event),
    }
}

fn handle_key(state: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => {
                if state.engine.is_busy() {
                    vec![UiEffect::CancelTurn]
                } else {
                    vec![UiEffect::Quit]
                }
            }
            _ => Vec::new(),
        };
    }

    match key.code {
        KeyCode::Esc => {
            if state.engine.is_busy() {
                vec![UiEffect::CancelTurn]
            } else if state.notice.is_some() {
                state.notice = None;
                Vec::new()
            } else {
                vec![UiEffect::Quit]
            }
        }
        KeyCode::Enter => {
            let query = state.input.text.trim().to_string();
            if query.is_empty() {
                return Vec::new();
            }
            if state.engine.is_busy() {
                state.set_notice("Lex is still responding. Press Esc to cancel.");
                return Vec::new();
            }
            state.input.take();
            vec![UiEffect::Submit { query }]
        }
        KeyCode::Char(c) => {
            state.input.insert(c);
            Vec::new()
        }
        KeyCode::Backspace => {
            state.input.backspace();
            Vec::new()
        }
        KeyCode::Left => {
            state.input.move_left();
            Vec::new()
        }
        KeyCode::Right => {
            state.input.move_right();
            Vec::new()
        }
        KeyCode::Home => {
            state.input.move_home();
            Vec::new()
        }
        KeyCode::End => {
            state.input.move_end();
            Vec::new()
        }
        KeyCode::Up => {
            state.scroll.scroll_up(1);
            Vec::new()
        }
        KeyCode::Down => {
            state.scroll.scroll_down(1);
            Vec::new()
        }
        KeyCode::PageUp => {
            state.scroll.page_up();
            Vec::new()
        }
        KeyCode::PageDown => {
            state.scroll.page_down();
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn handle_turn_event(state: &mut AppState, event: TurnEvent) -> Vec<UiEffect> {
    if let Some(outcome) = state.engine.apply(event) {
        // The turn reached a terminal state; drop the task handle so the
        // next submission starts clean.
        state.turn_task = None;
        match outcome {
            TurnOutcome::Completed => {}
            TurnOutcome::Errored { message } => {
                state.set_notice(format!("Failed to connect to the assistant: {message}"));
            }
            TurnOutcome::Canceled => state.set_notice("Interrupted."),
        }
    }
    Vec::new()
}
