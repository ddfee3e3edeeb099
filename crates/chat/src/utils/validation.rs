//! Validation utilities.

use crate::types::{ChatError, ChatResult};

/// Validation utilities
pub struct Validator;

impl Validator {
    /// A message needs text or an attachment.
    pub fn message_body(content: &str, image_url: Option<&str>) -> ChatResult<()> {
        let has_image = image_url.map(|url| !url.trim().is_empty()).unwrap_or(false);
        if content.trim().is_empty() && !has_image {
            return Err(ChatError::EmptyMessage);
        }

        Ok(())
    }

    /// Bearer credential for the socket handshake; blank tokens count as absent.
    pub fn credential(token: Option<&str>) -> ChatResult<&str> {
        match token.map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ChatError::MissingCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_requires_text_or_image() {
        assert!(Validator::message_body("hello", None).is_ok());
        assert!(Validator::message_body("", Some("https://cdn.test/a.png")).is_ok());
        assert!(matches!(
            Validator::message_body("   ", None),
            Err(ChatError::EmptyMessage)
        ));
        assert!(matches!(
            Validator::message_body("", Some("  ")),
            Err(ChatError::EmptyMessage)
        ));
    }

    #[test]
    fn credential_rejects_missing_and_blank_tokens() {
        assert_eq!(Validator::credential(Some(" abc ")).unwrap(), "abc");
        assert!(matches!(
            Validator::credential(None),
            Err(ChatError::MissingCredential)
        ));
        assert!(matches!(
            Validator::credential(Some("")),
            Err(ChatError::MissingCredential)
        ));
    }
}
