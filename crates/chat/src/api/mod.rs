//! REST side of the chat backend.

pub mod rest;

use async_trait::async_trait;

use crate::entities::ChatMessage;
use crate::types::{ChatResult, OrganizationId, RoomId};

pub use rest::RestChatApi;

/// Loads the persisted backlog of a room, oldest first.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    async fn fetch_history(
        &self,
        organization_id: OrganizationId,
        room_id: RoomId,
    ) -> ChatResult<Vec<ChatMessage>>;
}
