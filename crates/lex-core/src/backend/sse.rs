//! Streaming decoder for the backend's text-framed event protocol.
//!
//! The backend answers a query with a chunked `text/event-stream` body.
//! Frames are blank-line-delimited blocks of text; each well-formed frame
//! carries an `event:` line and a `data:` line. Chunk boundaries are
//! arbitrary: a frame, a line, a CRLF pair, or a single UTF-8 codepoint may
//! all be split across reads, and the decoded events must not depend on
//! where the splits fall.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::Stream;
use serde::Deserialize;
use serde_json::Value;

use super::{StreamEvent, TransportError, TransportResult};

/// Incremental frame decoder.
///
/// Holds exactly the suffix of decoded text not yet resolved into a complete
/// frame. Feeding bytes never re-scans text that a previous call already
/// searched, so total work is amortized linear in bytes received.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded, newline-normalized text awaiting a frame terminator.
    buf: String,
    /// Index into `buf` up to which no `\n\n` exists.
    scan: usize,
    /// Trailing bytes of an incomplete UTF-8 codepoint from the last chunk.
    partial: Vec<u8>,
    /// A trailing `\r` withheld until we know whether a `\n` follows it.
    pending_cr: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk of bytes, returning every frame it completed in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut decoded = String::new();
        self.decode_utf8(bytes, &mut decoded);
        let normalized = self.normalize_newlines(&decoded);
        self.buf.push_str(&normalized);
        self.split_frames()
    }

    /// Signals end-of-stream. Any unterminated trailing frame is discarded,
    /// never emitted.
    pub fn finish(&mut self) {
        if !self.buf.trim().is_empty() {
            tracing::debug!(
                bytes = self.buf.len(),
                "discarding unterminated trailing frame at end of stream"
            );
        }
        self.buf.clear();
        self.scan = 0;
        self.partial.clear();
        self.pending_cr = false;
    }

    /// Decodes bytes into `out`, carrying an incomplete trailing codepoint
    /// across calls. Invalid sequences degrade to U+FFFD and decoding
    /// continues.
    fn decode_utf8(&mut self, bytes: &[u8], out: &mut String) {
        let owned;
        let mut input: &[u8] = if self.partial.is_empty() {
            bytes
        } else {
            self.partial.extend_from_slice(bytes);
            owned = std::mem::take(&mut self.partial);
            &owned
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid..];
                        }
                        None => {
                            // Codepoint split across chunk boundary: hold the
                            // tail until more bytes arrive.
                            self.partial = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Normalizes CRLF to LF on newly decoded text only. A chunk ending in
    /// `\r` withholds it so a CRLF pair split across chunks still collapses.
    fn normalize_newlines(&mut self, decoded: &str) -> String {
        let mut text = String::with_capacity(decoded.len() + 1);
        if self.pending_cr {
            text.push('\r');
            self.pending_cr = false;
        }
        text.push_str(decoded);

        let mut normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\r') {
            normalized.pop();
            self.pending_cr = true;
        }
        normalized
    }

    /// Drains complete frames off the front of the buffer.
    fn split_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        loop {
            match self.buf[self.scan..].find("\n\n") {
                Some(rel) => {
                    let end = self.scan + rel;
                    let rest = self.buf.split_off(end + 2);
                    let mut frame = std::mem::replace(&mut self.buf, rest);
                    frame.truncate(end);
                    self.scan = 0;
                    frames.push(frame);
                }
                None => {
                    // Back off one byte so a trailing `\n` can pair with the
                    // next chunk's leading `\n`.
                    self.scan = if self.buf.ends_with('\n') {
                        self.buf.len() - 1
                    } else {
                        self.buf.len()
                    };
                    break;
                }
            }
        }
        frames
    }
}

#[derive(Debug, Deserialize)]
struct ToolUsePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ToolOutputPayload {
    name: String,
    output: Value,
}

/// Classifies one complete frame into a typed event.
///
/// The first `event:` line and the first `data:` line win; other lines are
/// ignored and the two fields may appear in either order. Frames missing
/// either field, frames with an unrecognized type, and `tool_use` /
/// `tool_output` frames with unparsable JSON payloads all yield `None` —
/// the stream is tolerant of noise and a bad frame never aborts it.
pub fn classify_frame(frame: &str) -> Option<StreamEvent> {
    let mut event_type = None;
    let mut data = None;

    for line in frame.lines() {
        if event_type.is_none()
            && let Some(value) = line.strip_prefix("event:")
        {
            event_type = Some(value.trim());
        } else if data.is_none()
            && let Some(value) = line.strip_prefix("data:")
        {
            data = Some(value.trim());
        }
    }

    let (event_type, data) = match (event_type, data) {
        (Some(event_type), Some(data)) => (event_type, data),
        _ => {
            tracing::debug!("dropping frame without event/data pair");
            return None;
        }
    };

    match event_type {
        "chunk" => Some(StreamEvent::Chunk {
            text: data.to_string(),
        }),
        "tool_use" => match serde_json::from_str::<ToolUsePayload>(data) {
            Ok(payload) => Some(StreamEvent::ToolUse { name: payload.name }),
            Err(err) => {
                tracing::warn!(%err, "dropping tool_use event with invalid payload");
                None
            }
        },
        "tool_output" => match serde_json::from_str::<ToolOutputPayload>(data) {
            Ok(payload) => Some(StreamEvent::ToolOutput {
                name: payload.name,
                output: payload.output,
            }),
            Err(err) => {
                tracing::warn!(%err, "dropping tool_output event with invalid payload");
                None
            }
        },
        "end" => Some(StreamEvent::End),
        other => {
            tracing::debug!(event_type = other, "ignoring unknown event type");
            None
        }
    }
}

/// Stream adapter that converts a byte stream into classified events.
///
/// Frames that fail classification are skipped in place; the only errors
/// this stream yields are transport failures from the underlying bytes.
pub struct SseParser<S> {
    inner: S,
    decoder: FrameDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> SseParser<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = TransportResult<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let frames = self.decoder.feed(&bytes);
                    for frame in frames {
                        if let Some(event) = classify_frame(&frame) {
                            self.pending.push_back(event);
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(TransportError::stream(format!(
                        "stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.decoder.finish();
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
