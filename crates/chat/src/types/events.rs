//! Event types for the real-time channel and the session built on it.

use crate::entities::ChatMessage;
use crate::types::ChatError;

/// Emitted by a connection worker and read through
/// [`ConnectionHandle::next_event`](crate::services::ConnectionHandle::next_event).
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Handshake completed and the room topic is subscribed.
    Opened,
    /// A decoded message arrived on the room topic.
    Message(ChatMessage),
    /// Handshake failed or the broker sent an ERROR frame.
    Failed(ChatError),
    /// An established connection was lost; a reconnect follows.
    Dropped,
    /// The worker gave up and released the transport.
    Closed,
}

/// What changed in a [`ChatSession`](crate::services::ChatSession) after
/// one event was dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected,
    MessageAppended { index: usize },
    Reconnecting,
    Failed { status: String },
    Closed,
    /// The event had no effect in the current state.
    Ignored,
}
