//! Connection lifecycle, message channel and the per-room session.

pub mod channel;
pub mod connection;
pub mod session;

pub use channel::MessageChannel;
pub use connection::{
    ConnectionHandle, ConnectionManager, ConnectionSettings, ConnectionState, SUBSCRIPTION_ID,
};
pub use session::{ChatSession, SessionParams, SessionState};
