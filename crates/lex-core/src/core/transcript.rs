//! The chat transcript: the ordered message log a session accumulates.
//!
//! The transcript is append-only with a single exception: while a turn is
//! in flight, the most recent assistant message grows in place as chunks
//! arrive and flips to complete when the turn ends. Everything else is
//! immutable history once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message in the transcript.
///
/// Ids are opaque and unique for the lifetime of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        id: String,
        content: String,
        created_at: DateTime<Utc>,
    },
    Assistant {
        id: String,
        content: String,
        is_complete: bool,
        created_at: DateTime<Utc>,
    },
    Tool {
        id: String,
        tool: String,
        content: Value,
        created_at: DateTime<Utc>,
    },
}

impl Message {
    pub fn id(&self) -> &str {
        match self {
            Message::User { id, .. } | Message::Assistant { id, .. } | Message::Tool { id, .. } => {
                id
            }
        }
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ordered message log for one session, across all of its turns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Appends a user message, returning its id.
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        let id = new_message_id();
        self.messages.push(Message::User {
            id: id.clone(),
            content: content.into(),
            created_at: Utc::now(),
        });
        id
    }

    /// Appends an empty, incomplete assistant message, returning its id.
    pub fn push_assistant_placeholder(&mut self) -> String {
        let id = new_message_id();
        self.messages.push(Message::Assistant {
            id: id.clone(),
            content: String::new(),
            is_complete: false,
            created_at: Utc::now(),
        });
        id
    }

    /// Appends a tool message. Tool messages are written once and never
    /// mutated afterwards.
    pub fn push_tool(&mut self, tool: impl Into<String>, output: Value) -> String {
        let id = new_message_id();
        self.messages.push(Message::Tool {
            id: id.clone(),
            tool: tool.into(),
            content: output,
            created_at: Utc::now(),
        });
        id
    }

    /// Appends a chunk of text to the assistant message with the given id,
    /// applying the boundary-space join rule.
    pub fn append_assistant_text(&mut self, id: &str, text: &str) {
        if let Some(Message::Assistant { content, .. }) = self.find_assistant_mut(id) {
            push_chunk(content, text);
        }
    }

    /// Marks the assistant message with the given id complete.
    pub fn complete_assistant(&mut self, id: &str) {
        if let Some(Message::Assistant { is_complete, .. }) = self.find_assistant_mut(id) {
            *is_complete = true;
        }
    }

    fn find_assistant_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }) && m.id() == id)
    }
}

/// Joins a streamed chunk onto accumulated content.
///
/// Exactly one separating space is inserted when neither the existing tail
/// nor the chunk's head already carries whitespace; the first chunk and
/// empty chunks concatenate verbatim. The backend streams word-aligned
/// deltas, and this rule is what keeps `"Hello"` + `"world"` from becoming
/// `"Helloworld"` without ever doubling a space.
fn push_chunk(content: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    let tail_has_ws = content.chars().next_back().is_some_and(char::is_whitespace);
    let head_has_ws = text.chars().next().is_some_and(char::is_whitespace);
    if !content.is_empty() && !tail_has_ws && !head_has_ws {
        content.push(' ');
    }
    content.push_str(text);
}
