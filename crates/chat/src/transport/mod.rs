//! WebSocket seam under the STOMP connection.
//!
//! The connection worker only sees text payloads; ping/pong and close
//! frames are handled by the concrete transport.

pub mod memory;
pub mod tungstenite;

use async_trait::async_trait;
use url::Url;

use crate::types::ChatResult;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use tungstenite::TungsteniteConnector;

/// One established, bidirectional text channel.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> ChatResult<()>;

    /// Next text payload. `None` once the peer closed the socket.
    async fn recv(&mut self) -> Option<ChatResult<String>>;

    async fn close(&mut self);
}

/// Opens transports authenticated with a bearer token.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url, bearer: &str) -> ChatResult<Box<dyn Transport>>;
}
