//! # orgchat Chat Crate
//!
//! Client side of the organization chat panel: one authenticated STOMP
//! connection per chat room, a typed publish/subscribe channel on top of
//! it, and a per-room session that merges the REST history snapshot with
//! the live message stream into a single append-only view.
//!
//! ## Architecture
//!
//! - **Stomp**: frame codec and heart-beat negotiation
//! - **Transport**: WebSocket seam (`tokio-tungstenite` or in-memory)
//! - **Services**: connection manager, message channel, chat session
//! - **Api**: REST endpoints of the chat backend, including history
//! - **Auth**: bearer token providers
//! - **Types** / **Entities**: errors, events and wire models
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orgchat_chat::{ChatSession, SessionParams, SenderRole};
//!
//! let mut session = ChatSession::new(params, history, tokens, connections);
//! session.connect().await;
//! while let Some(update) = session.next_update().await {
//!     render(&session, update);
//! }
//! ```

pub mod api;
pub mod auth;
pub mod entities;
pub mod services;
pub mod stomp;
pub mod transport;
pub mod types;
pub mod utils;

pub use api::{HistoryFetcher, RestChatApi};
pub use auth::{EnvToken, MemoryTokenStore, StaticToken, TokenProvider};
pub use entities::{ChatMessage, ChatRoom, ImageUpload, OutboundMessage};
pub use services::{
    ChatSession, ConnectionHandle, ConnectionManager, ConnectionSettings, ConnectionState,
    MessageChannel, SessionParams, SessionState,
};
pub use types::{
    ChatError, ChatResult, ConnectionEvent, OrganizationId, RoomId, SenderRole, SessionUpdate,
};
