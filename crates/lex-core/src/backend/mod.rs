//! Backend protocol plumbing: HTTP client, frame decoding, event types.

use std::fmt;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod client;
mod sse;

pub use client::BackendClient;
pub use sse::{FrameDecoder, SseParser, classify_frame};

/// Standard User-Agent header for lex API requests.
pub const USER_AGENT: &str = concat!("lex/", env!("CARGO_PKG_VERSION"));

/// Events emitted by the query stream.
///
/// Each value corresponds to one well-formed protocol frame. Frames that
/// fail classification produce no event at all (see [`classify_frame`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk { text: String },
    /// The backend started executing a tool.
    ToolUse { name: String },
    /// A tool finished; `output` is opaque to the core and handed to the
    /// presentation layer as-is.
    ToolOutput { name: String, output: Value },
    /// End of the assistant turn. Payload content is ignored.
    End,
}

/// Categories of transport errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout, request timeout, or idle-read timeout
    Timeout,
    /// Failed to reach the backend at all
    Connect,
    /// The response body stream failed or ended prematurely
    Stream,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connect => write!(f, "connect"),
            TransportErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// Structured transport failure with kind and details.
///
/// Transport failures are the only errors the protocol layer surfaces.
/// Malformed frames and payloads are dropped where they occur and never
/// reach the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportError {
    /// Error category
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl TransportError {
    /// Creates a new transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            // Try to extract a cleaner error message from JSON
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: TransportErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: TransportErrorKind::HttpStatus,
            message,
            details,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Creates a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// Creates a mid-stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Stream, message)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Boxed stream of classified protocol events.
pub type EventStream = BoxStream<'static, TransportResult<StreamEvent>>;
