use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ChatError, OrganizationId, RoomId};

/// A chat room as listed by the organization endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireRoom")]
pub struct ChatRoom {
    pub id: RoomId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound shape; the identifier arrives as `id`, `roomId` or both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRoom {
    #[serde(default)]
    id: Option<RoomId>,
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    organization_id: Option<OrganizationId>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<WireRoom> for ChatRoom {
    type Error = String;

    fn try_from(wire: WireRoom) -> Result<Self, Self::Error> {
        let id = wire
            .id
            .or(wire.room_id)
            .ok_or_else(|| "chat room without id".to_string())?;
        Ok(Self {
            id,
            organization_id: wire.organization_id,
            extra: wire.extra,
        })
    }
}

/// Result of an image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub image_url: String,
}

/// The upload endpoint answers either with the bare URL or with an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UploadResponse {
    Url(String),
    Object {
        #[serde(rename = "imageUrl", default)]
        image_url: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl TryFrom<UploadResponse> for ImageUpload {
    type Error = ChatError;

    fn try_from(response: UploadResponse) -> Result<Self, Self::Error> {
        let image_url = match response {
            UploadResponse::Url(image_url) => Some(image_url),
            UploadResponse::Object { image_url, url } => image_url.or(url),
        };
        image_url
            .map(|image_url| Self { image_url })
            .ok_or_else(|| ChatError::decode("upload response has no image URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_accepts_either_key() {
        let room: ChatRoom = serde_json::from_str(r#"{"roomId":5,"memberName":"Kim"}"#).unwrap();
        assert_eq!(room.id, 5);
        assert_eq!(room.extra.get("memberName"), Some(&Value::from("Kim")));

        let room: ChatRoom = serde_json::from_str(r#"{"id":9,"roomId":9,"organizationId":2}"#).unwrap();
        assert_eq!(room.id, 9);
        assert_eq!(room.organization_id, Some(2));
        assert!(room.extra.is_empty());

        assert!(serde_json::from_str::<ChatRoom>(r#"{"organizationId":2}"#).is_err());
    }

    #[test]
    fn upload_object_with_both_url_keys() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"imageUrl":"https://cdn.test/a.png","url":"https://cdn.test/b.png"}"#).unwrap();
        let upload = ImageUpload::try_from(response).unwrap();
        assert_eq!(upload.image_url, "https://cdn.test/a.png");

        let response: UploadResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(matches!(
            ImageUpload::try_from(response),
            Err(ChatError::Decode { .. })
        ));
    }
}
