//! Per-turn state machine.
//!
//! A turn spans one user submission through its terminal outcome. The
//! machine is the sole mutator of the transcript and of the tool-in-use
//! indicator; at most one turn is ever active, which is the only mutual
//! exclusion the system needs.

use crate::backend::StreamEvent;
use crate::core::transcript::Transcript;

/// Phase of the active turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    /// No turn in flight; submissions are accepted.
    #[default]
    Idle,
    /// Assistant response streaming.
    Streaming,
    /// A tool is executing on the backend; re-entered from Streaming for
    /// every tool invocation within the turn.
    ToolActive,
}

/// Error returned when a submission arrives while a turn is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnBusyError;

impl std::fmt::Display for TurnBusyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a turn is already in progress")
    }
}

impl std::error::Error for TurnBusyError {}

/// State for the single active turn.
///
/// Terminal transitions (`complete`, `fail`, `cancel`) always clear the
/// tool indicator and release the active assistant message, returning the
/// machine to `Idle`.
#[derive(Debug, Default)]
pub struct TurnState {
    phase: TurnPhase,
    tool_in_use: Option<String>,
    active_assistant: Option<String>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    /// Name of the tool currently executing, if any.
    pub fn tool_in_use(&self) -> Option<&str> {
        self.tool_in_use.as_deref()
    }

    /// Opens a turn: appends the user message and the empty assistant
    /// placeholder together, and moves to `Streaming`.
    ///
    /// # Errors
    /// Returns [`TurnBusyError`] if a turn is already active; the
    /// transcript is left untouched in that case.
    pub fn begin(&mut self, transcript: &mut Transcript, query: &str) -> Result<(), TurnBusyError> {
        if self.is_active() {
            return Err(TurnBusyError);
        }
        transcript.push_user(query);
        self.active_assistant = Some(transcript.push_assistant_placeholder());
        self.phase = TurnPhase::Streaming;
        Ok(())
    }

    /// Applies one classified event to the transcript.
    ///
    /// Events arriving while `Idle` (stale events after a terminal
    /// transition) are ignored.
    pub fn apply(&mut self, transcript: &mut Transcript, event: StreamEvent) {
        if !self.is_active() {
            return;
        }
        match event {
            StreamEvent::Chunk { text } => {
                if let Some(id) = &self.active_assistant {
                    transcript.append_assistant_text(id, &text);
                }
            }
            StreamEvent::ToolUse { name } => {
                self.tool_in_use = Some(name);
                self.phase = TurnPhase::ToolActive;
            }
            StreamEvent::ToolOutput { name, output } => {
                transcript.push_tool(name, output);
                self.tool_in_use = None;
                self.phase = TurnPhase::Streaming;
            }
            StreamEvent::End => self.complete(transcript),
        }
    }

    /// Terminal transition for a successful turn: marks the assistant
    /// message complete.
    pub fn complete(&mut self, transcript: &mut Transcript) {
        if let Some(id) = self.active_assistant.take() {
            transcript.complete_assistant(&id);
        }
        self.reset();
    }

    /// Terminal transition for a failed turn: the assistant message stays
    /// as-is, incomplete.
    pub fn fail(&mut self) {
        self.active_assistant = None;
        self.reset();
    }

    /// Terminal transition for a cancelled turn. Same transcript effect as
    /// `fail`; kept separate because cancellation is not an error.
    pub fn cancel(&mut self) {
        self.active_assistant = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.tool_in_use = None;
        self.phase = TurnPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::transcript::Message;

    fn active_assistant(transcript: &Transcript) -> (&str, bool) {
        let Some(Message::Assistant {
            content,
            is_complete,
            ..
        }) = transcript
            .messages()
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
        else {
            panic!("expected an assistant message");
        };
        (content, *is_complete)
    }

    #[test]
    fn begin_appends_user_and_placeholder_together() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "hello").unwrap();

        assert_eq!(transcript.len(), 2);
        assert!(matches!(
            transcript.messages()[0],
            Message::User { ref content, .. } if content == "hello"
        ));
        let (content, complete) = active_assistant(&transcript);
        assert_eq!(content, "");
        assert!(!complete);
        assert_eq!(turn.phase(), TurnPhase::Streaming);
    }

    #[test]
    fn submission_while_busy_is_rejected() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "first").unwrap();

        assert_eq!(turn.begin(&mut transcript, "second"), Err(TurnBusyError));
        // The rejected submission must not have touched the transcript.
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn chunks_accumulate_with_join_rule() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();

        for text in ["Hello", "world"] {
            turn.apply(
                &mut transcript,
                StreamEvent::Chunk {
                    text: text.to_string(),
                },
            );
        }
        turn.apply(&mut transcript, StreamEvent::End);

        let (content, complete) = active_assistant(&transcript);
        assert_eq!(content, "Hello world");
        assert!(complete);
        assert_eq!(turn.phase(), TurnPhase::Idle);
    }

    #[test]
    fn end_without_chunks_completes_empty_message() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();
        turn.apply(&mut transcript, StreamEvent::End);

        let (content, complete) = active_assistant(&transcript);
        assert_eq!(content, "");
        assert!(complete);
    }

    #[test]
    fn tool_use_then_output_round_trips_the_indicator() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "weather?").unwrap();

        turn.apply(
            &mut transcript,
            StreamEvent::ToolUse {
                name: "get_weather".to_string(),
            },
        );
        assert_eq!(turn.tool_in_use(), Some("get_weather"));
        assert_eq!(turn.phase(), TurnPhase::ToolActive);

        turn.apply(
            &mut transcript,
            StreamEvent::ToolOutput {
                name: "get_weather".to_string(),
                output: json!("Sunny, 25C"),
            },
        );
        assert_eq!(turn.tool_in_use(), None);
        assert_eq!(turn.phase(), TurnPhase::Streaming);

        let tool_messages: Vec<_> = transcript
            .messages()
            .iter()
            .filter(|m| matches!(m, Message::Tool { .. }))
            .collect();
        assert_eq!(tool_messages.len(), 1);
    }

    #[test]
    fn dangling_tool_use_clears_only_at_end() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();

        turn.apply(
            &mut transcript,
            StreamEvent::ToolUse {
                name: "schedule_appointment".to_string(),
            },
        );
        turn.apply(
            &mut transcript,
            StreamEvent::Chunk {
                text: "still thinking".to_string(),
            },
        );
        assert_eq!(turn.tool_in_use(), Some("schedule_appointment"));

        turn.apply(&mut transcript, StreamEvent::End);
        assert_eq!(turn.tool_in_use(), None);
        let (_, complete) = active_assistant(&transcript);
        assert!(complete);
    }

    #[test]
    fn failure_leaves_assistant_incomplete_and_returns_to_idle() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();
        turn.apply(
            &mut transcript,
            StreamEvent::Chunk {
                text: "partial".to_string(),
            },
        );
        turn.apply(
            &mut transcript,
            StreamEvent::ToolUse {
                name: "get_weather".to_string(),
            },
        );

        turn.fail();

        assert_eq!(turn.phase(), TurnPhase::Idle);
        assert_eq!(turn.tool_in_use(), None);
        let (content, complete) = active_assistant(&transcript);
        assert_eq!(content, "partial");
        assert!(!complete);

        // The next submission is accepted.
        assert!(turn.begin(&mut transcript, "again").is_ok());
    }

    #[test]
    fn events_after_terminal_transition_are_ignored() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();
        turn.cancel();

        let before = transcript.len();
        turn.apply(
            &mut transcript,
            StreamEvent::Chunk {
                text: "stale".to_string(),
            },
        );
        turn.apply(
            &mut transcript,
            StreamEvent::ToolOutput {
                name: "get_weather".to_string(),
                output: json!(null),
            },
        );
        assert_eq!(transcript.len(), before);
        let (content, _) = active_assistant(&transcript);
        assert_eq!(content, "");
    }

    #[test]
    fn consecutive_tool_uses_latest_wins() {
        let mut transcript = Transcript::new();
        let mut turn = TurnState::new();
        turn.begin(&mut transcript, "q").unwrap();

        turn.apply(
            &mut transcript,
            StreamEvent::ToolUse {
                name: "get_weather".to_string(),
            },
        );
        turn.apply(
            &mut transcript,
            StreamEvent::ToolUse {
                name: "get_dealership_address".to_string(),
            },
        );
        assert_eq!(turn.tool_in_use(), Some("get_dealership_address"));
    }
}
