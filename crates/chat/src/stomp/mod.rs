//! Minimal STOMP client codec: the frames a chat subscriber needs and
//! heart-beat negotiation.

pub mod frame;
pub mod heartbeat;

pub use frame::{commands, Frame};
pub use heartbeat::{Heartbeat, Negotiated};
