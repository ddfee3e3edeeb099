use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::{RoomId, SenderRole};

/// A chat message as delivered by the history endpoint or echoed on the
/// room topic. Never mutated after it is received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireMessage")]
pub struct ChatMessage {
    /// Server-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Room the message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Staff vs. member authorship
    pub sender_is_admin: bool,
    /// Plain-text body, empty for image-only messages
    pub content: String,
    /// Attachment reference
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Fields the client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound shape. Backends spell the role flag `senderIsAdmin`, `admin`
/// or `isAdmin`, sometimes several at once; the first one present wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    sender_is_admin: Option<bool>,
    #[serde(default)]
    admin: Option<bool>,
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default, deserialize_with = "null_as_empty")]
    content: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireMessage> for ChatMessage {
    fn from(wire: WireMessage) -> Self {
        Self {
            id: wire.id,
            room_id: wire.room_id,
            sender_is_admin: wire
                .sender_is_admin
                .or(wire.admin)
                .or(wire.is_admin)
                .unwrap_or(false),
            content: wire.content,
            image_url: wire.image_url,
            sender_name: wire.sender_name,
            created_at: wire.created_at,
            extra: wire.extra,
        }
    }
}

impl ChatMessage {
    pub fn new(room_id: RoomId, content: impl Into<String>, role: SenderRole) -> Self {
        Self {
            id: None,
            room_id: Some(room_id),
            sender_is_admin: role.is_admin(),
            content: content.into(),
            image_url: None,
            sender_name: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn role(&self) -> SenderRole {
        SenderRole::from(self.sender_is_admin)
    }

    pub fn has_image(&self) -> bool {
        self.image_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Room-scoped envelope published to the application destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub room_id: RoomId,
    pub content: String,
    pub image_url: Option<String>,
    pub sender_is_admin: bool,
}

impl OutboundMessage {
    /// Build an envelope, trimming the content and discarding a blank image URL.
    pub fn new(room_id: RoomId, content: &str, image_url: Option<&str>, role: SenderRole) -> Self {
        let image_url = image_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Self {
            room_id,
            content: content.trim().to_string(),
            image_url,
            sender_is_admin: role.is_admin(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
