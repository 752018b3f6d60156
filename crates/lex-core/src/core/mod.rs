//! Engine internals: transcript, turn state machine, events, read loop.

pub mod chat;
pub mod events;
pub mod interrupt;
pub mod transcript;
pub mod turn;
