//! Chat engine: session state plus the per-turn read loop.
//!
//! `ChatEngine` owns the transcript and the turn state machine and is the
//! only mutator of either. `run_turn` is the spawned async read loop that
//! drives one turn: it awaits byte buffers, decodes and classifies them,
//! and forwards the resulting events over a bounded channel, finishing with
//! exactly one terminal event.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, EventStream, StreamEvent, TransportError};
use crate::core::events::{TurnEvent, TurnEventTx, TurnOutcome};
use crate::core::transcript::Transcript;
use crate::core::turn::{TurnBusyError, TurnState};

/// Session-scoped chat state.
///
/// One engine corresponds to one backend session: the session id is
/// generated once and sent unchanged with every query.
#[derive(Debug)]
pub struct ChatEngine {
    session_id: String,
    transcript: Transcript,
    turn: TurnState,
}

impl Default for ChatEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatEngine {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            transcript: Transcript::new(),
            turn: TurnState::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Name of the tool currently executing, if any.
    pub fn tool_in_use(&self) -> Option<&str> {
        self.turn.tool_in_use()
    }

    pub fn is_busy(&self) -> bool {
        self.turn.is_active()
    }

    /// Opens a turn for the given query.
    ///
    /// The caller is expected to spawn [`run_turn`] next and feed the
    /// resulting events back through [`ChatEngine::apply`].
    ///
    /// # Errors
    /// Returns [`TurnBusyError`] while a turn is in flight; the transcript
    /// is untouched and no new turn is opened.
    pub fn submit(&mut self, query: &str) -> Result<(), TurnBusyError> {
        self.turn.begin(&mut self.transcript, query)
    }

    /// Applies one turn event, returning the outcome if it was terminal.
    ///
    /// Stale events arriving after a terminal transition are ignored.
    pub fn apply(&mut self, event: TurnEvent) -> Option<TurnOutcome> {
        if !self.turn.is_active() {
            return None;
        }
        match event {
            TurnEvent::Event(StreamEvent::End) => {
                self.turn.complete(&mut self.transcript);
                Some(TurnOutcome::Completed)
            }
            TurnEvent::Event(event) => {
                self.turn.apply(&mut self.transcript, event);
                None
            }
            TurnEvent::Closed => {
                // The backend terminates every successful turn with an `end`
                // frame; a clean EOF before it is a transport failure.
                self.turn.fail();
                Some(TurnOutcome::Errored {
                    message: "response stream ended unexpectedly".to_string(),
                })
            }
            TurnEvent::Failed { error } => {
                tracing::warn!(kind = %error.kind, message = %error.message, "turn failed");
                self.turn.fail();
                Some(TurnOutcome::Errored {
                    message: error.message,
                })
            }
            TurnEvent::Canceled => {
                self.turn.cancel();
                Some(TurnOutcome::Canceled)
            }
        }
    }
}

/// Runs one turn's read loop.
///
/// Suspends awaiting the next byte buffer and applies decode + classify in
/// full before suspending again; classified events go out over `tx` in
/// frame order. Cancellation stops reads promptly and drops the stream,
/// releasing the connection. `idle_timeout` bounds the wait for each read;
/// expiry takes the same teardown path with a timeout error.
pub async fn run_turn(
    client: BackendClient,
    query: String,
    session_id: String,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
    tx: TurnEventTx,
) {
    let stream = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            let _ = tx.send(TurnEvent::Canceled).await;
            return;
        }
        result = client.send_query_stream(&query, &session_id) => result,
    };

    let mut stream = match stream {
        Ok(stream) => stream,
        Err(error) => {
            let _ = tx.send(TurnEvent::Failed { error }).await;
            return;
        }
    };

    loop {
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = tx.send(TurnEvent::Canceled).await;
                return;
            }
            step = next_event(&mut stream, idle_timeout) => step,
        };

        match step {
            ReadStep::Event(event) => {
                if tx.send(TurnEvent::Event(event)).await.is_err() {
                    // Receiver gone; nothing left to drive.
                    return;
                }
            }
            ReadStep::Closed => {
                let _ = tx.send(TurnEvent::Closed).await;
                return;
            }
            ReadStep::Failed(error) => {
                let _ = tx.send(TurnEvent::Failed { error }).await;
                return;
            }
        }
    }
}

enum ReadStep {
    Event(StreamEvent),
    Closed,
    Failed(TransportError),
}

async fn next_event(stream: &mut EventStream, idle_timeout: Option<Duration>) -> ReadStep {
    let next = match idle_timeout {
        Some(limit) => match timeout(limit, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                return ReadStep::Failed(TransportError::timeout(format!(
                    "no data from backend for {}s",
                    limit.as_secs()
                )));
            }
        },
        None => stream.next().await,
    };

    match next {
        Some(Ok(event)) => ReadStep::Event(event),
        Some(Err(error)) => ReadStep::Failed(error),
        None => ReadStep::Closed,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::TransportErrorKind;
    use crate::core::transcript::Message;

    fn chunk(text: &str) -> TurnEvent {
        TurnEvent::Event(StreamEvent::Chunk {
            text: text.to_string(),
        })
    }

    #[test]
    fn full_turn_reaches_completed() {
        let mut engine = ChatEngine::new();
        engine.submit("hi").unwrap();
        assert!(engine.is_busy());

        assert_eq!(engine.apply(chunk("Hello")), None);
        assert_eq!(engine.apply(chunk("world")), None);
        assert_eq!(
            engine.apply(TurnEvent::Event(StreamEvent::End)),
            Some(TurnOutcome::Completed)
        );
        assert!(!engine.is_busy());

        let Some(Message::Assistant {
            content,
            is_complete,
            ..
        }) = engine.transcript().messages().last()
        else {
            panic!("expected assistant message");
        };
        assert_eq!(content, "Hello world");
        assert!(*is_complete);
    }

    #[test]
    fn transport_failure_keeps_partial_transcript_and_frees_engine() {
        let mut engine = ChatEngine::new();
        engine.submit("hi").unwrap();
        engine.apply(chunk("partial"));

        let outcome = engine.apply(TurnEvent::Failed {
            error: TransportError::http_status(500, ""),
        });
        assert_eq!(
            outcome,
            Some(TurnOutcome::Errored {
                message: "HTTP 500".to_string()
            })
        );

        // User message and incomplete assistant message are retained.
        assert_eq!(engine.transcript().len(), 2);
        let Some(Message::Assistant {
            content,
            is_complete,
            ..
        }) = engine.transcript().messages().last()
        else {
            panic!("expected assistant message");
        };
        assert_eq!(content, "partial");
        assert!(!*is_complete);

        // The next submission is accepted.
        assert!(engine.submit("again").is_ok());
    }

    #[test]
    fn premature_close_is_an_error() {
        let mut engine = ChatEngine::new();
        engine.submit("hi").unwrap();
        let outcome = engine.apply(TurnEvent::Closed);
        assert!(matches!(outcome, Some(TurnOutcome::Errored { .. })));
        assert!(!engine.is_busy());
    }

    #[test]
    fn close_after_end_is_a_no_op() {
        let mut engine = ChatEngine::new();
        engine.submit("hi").unwrap();
        engine.apply(TurnEvent::Event(StreamEvent::End));
        assert_eq!(engine.apply(TurnEvent::Closed), None);
    }

    #[test]
    fn cancellation_clears_tool_in_use() {
        let mut engine = ChatEngine::new();
        engine.submit("hi").unwrap();
        engine.apply(TurnEvent::Event(StreamEvent::ToolUse {
            name: "get_weather".to_string(),
        }));
        assert_eq!(engine.tool_in_use(), Some("get_weather"));

        assert_eq!(engine.apply(TurnEvent::Canceled), Some(TurnOutcome::Canceled));
        assert_eq!(engine.tool_in_use(), None);
        assert!(!engine.is_busy());
    }

    #[test]
    fn tool_output_appends_tool_message() {
        let mut engine = ChatEngine::new();
        engine.submit("weather?").unwrap();
        engine.apply(TurnEvent::Event(StreamEvent::ToolUse {
            name: "get_weather".to_string(),
        }));
        engine.apply(TurnEvent::Event(StreamEvent::ToolOutput {
            name: "get_weather".to_string(),
            output: json!("Sunny, 25C"),
        }));

        assert_eq!(engine.tool_in_use(), None);
        assert!(matches!(
            engine.transcript().messages().last(),
            Some(Message::Tool { tool, .. }) if tool == "get_weather"
        ));
    }

    #[test]
    fn submit_while_busy_is_rejected() {
        let mut engine = ChatEngine::new();
        engine.submit("one").unwrap();
        assert!(engine.submit("two").is_err());
    }

    #[tokio::test]
    async fn run_turn_reports_connect_failure() {
        // Nothing listens on this port; the request itself must fail and
        // the turn must end with a single Failed event.
        let client = BackendClient::new("http://127.0.0.1:1");
        let (tx, mut rx) = crate::core::events::create_event_channel();
        run_turn(
            client,
            "hi".to_string(),
            "session".to_string(),
            None,
            CancellationToken::new(),
            tx,
        )
        .await;

        let Some(TurnEvent::Failed { error }) = rx.recv().await else {
            panic!("expected Failed event");
        };
        assert_eq!(error.kind, TransportErrorKind::Connect);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn idle_timeout_fails_the_read() {
        let mut stream: EventStream = futures_util::stream::pending().boxed();
        let step = next_event(&mut stream, Some(Duration::from_millis(10))).await;
        let ReadStep::Failed(error) = step else {
            panic!("expected timeout failure");
        };
        assert_eq!(error.kind, TransportErrorKind::Timeout);
    }

    #[tokio::test]
    async fn run_turn_cancelled_before_request_reports_canceled() {
        let client = BackendClient::new("http://127.0.0.1:1");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = crate::core::events::create_event_channel();
        run_turn(
            client,
            "hi".to_string(),
            "session".to_string(),
            None,
            cancel,
            tx,
        )
        .await;

        assert!(matches!(rx.recv().await, Some(TurnEvent::Canceled)));
        assert!(rx.recv().await.is_none());
    }
}
