//! Turn event types for streaming between the read loop and the UI.

use tokio::sync::mpsc;

use crate::backend::{StreamEvent, TransportError};

/// Events delivered by a running turn's read loop.
///
/// A turn sends any number of `Event`s followed by exactly one terminal
/// event (`Closed`, `Failed`, or `Canceled`). FIFO channel delivery keeps
/// transcript mutations in byte-stream order.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// One classified protocol event.
    Event(StreamEvent),
    /// The byte stream ended cleanly.
    Closed,
    /// Transport failure (HTTP status, connect, mid-stream, idle timeout).
    Failed { error: TransportError },
    /// The turn was cancelled by the caller.
    Canceled,
}

/// Terminal outcome of a turn, reported when the engine leaves the active
/// phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Errored { message: String },
    Canceled,
}

/// Channel-based turn event sender (async, bounded).
pub type TurnEventTx = mpsc::Sender<TurnEvent>;

/// Channel-based turn event receiver (async, bounded).
pub type TurnEventRx = mpsc::Receiver<TurnEvent>;

/// Default channel capacity for turn event streams.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded turn event channel with the default capacity.
pub fn create_event_channel() -> (TurnEventTx, TurnEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}
