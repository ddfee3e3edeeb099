use tracing::debug;

use crate::entities::{ChatMessage, OutboundMessage};
use crate::services::ConnectionHandle;
use crate::types::{ChatError, ChatResult};
use crate::utils::Validator;

/// Room-scoped publish/subscribe contract on top of a connection.
pub struct MessageChannel;

impl MessageChannel {
    /// Hand one envelope to the connection. Success means the frame was
    /// queued for the socket, not that the server stored it; the stored
    /// copy comes back on the room topic.
    pub fn publish(handle: &ConnectionHandle, message: &OutboundMessage) -> ChatResult<()> {
        if !handle.is_connected() {
            return Err(ChatError::NotConnected);
        }
        Validator::message_body(&message.content, message.image_url.as_deref())?;

        let body = serde_json::to_string(message)
            .map_err(|err| ChatError::internal(format!("unable to encode message: {err}")))?;
        debug!(room_id = message.room_id, bytes = body.len(), "publishing chat message");

        handle.transmit(body)
    }

    /// Decode a MESSAGE body received on the room topic.
    pub fn decode(body: &str) -> ChatResult<ChatMessage> {
        serde_json::from_str(body).map_err(|err| ChatError::decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SenderRole;

    #[test]
    fn decodes_echoed_message() {
        let message = MessageChannel::decode(
            r#"{"id":11,"roomId":4,"content":"hi","imageUrl":null,"senderIsAdmin":true,"createdAt":"2024-05-01T09:00:00"}"#,
        )
        .unwrap();

        assert_eq!(message.id, Some(11));
        assert_eq!(message.room_id, Some(4));
        assert_eq!(message.content, "hi");
        assert_eq!(message.image_url, None);
        assert_eq!(message.role(), SenderRole::Admin);
        assert_eq!(message.created_at.as_deref(), Some("2024-05-01T09:00:00"));
    }

    #[test]
    fn accepts_legacy_role_spellings_and_keeps_unknown_fields() {
        let message =
            MessageChannel::decode(r#"{"content":null,"imageUrl":"https://cdn.test/a.png","admin":true,"senderId":5}"#)
                .unwrap();
        assert!(message.sender_is_admin);
        assert!(message.content.is_empty());
        assert!(message.has_image());
        assert_eq!(message.extra.get("senderId"), Some(&serde_json::json!(5)));

        let message = MessageChannel::decode(r#"{"content":"x","isAdmin":false}"#).unwrap();
        assert_eq!(message.role(), SenderRole::Member);
    }

    #[test]
    fn canonical_role_key_wins_when_several_are_present() {
        let message = MessageChannel::decode(
            r#"{"roomId":7,"content":"hi","senderIsAdmin":true,"admin":false,"isAdmin":false}"#,
        )
        .unwrap();
        assert_eq!(message.role(), SenderRole::Admin);
        assert!(message.extra.is_empty());

        let message =
            MessageChannel::decode(r#"{"roomId":7,"content":"hi","admin":true,"isAdmin":false}"#).unwrap();
        assert_eq!(message.role(), SenderRole::Admin);

        let message = MessageChannel::decode(r#"{"roomId":7,"content":"hi","senderIsAdmin":null}"#).unwrap();
        assert_eq!(message.role(), SenderRole::Member);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            MessageChannel::decode("not json"),
            Err(ChatError::Decode { .. })
        ));
        assert!(matches!(
            MessageChannel::decode(r#"["array"]"#),
            Err(ChatError::Decode { .. })
        ));
    }

    #[test]
    fn envelope_wire_shape() {
        let envelope = OutboundMessage::new(7, "  hello ", Some(" "), SenderRole::Member);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({
                "roomId": 7,
                "content": "hello",
                "imageUrl": null,
                "senderIsAdmin": false
            })
        );
    }
}
