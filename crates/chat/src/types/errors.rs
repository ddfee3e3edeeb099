//! Error types for the chat client.

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

pub const HISTORY_FAILED_STATUS: &str = "Failed to load chat history.";
pub const CONNECT_FAILED_STATUS: &str = "Failed to connect to chat.";
pub const CONNECTION_LOST_STATUS: &str = "Chat connection lost.";
pub const SIGN_IN_REQUIRED_STATUS: &str = "Please sign in to use chat.";
pub const SESSION_EXPIRED_STATUS: &str = "Your session has expired. Please sign in again.";
pub const NOT_CONNECTED_STATUS: &str = "Chat is not connected.";
pub const EMPTY_MESSAGE_STATUS: &str = "Message is empty.";

/// Main error type for the chat client
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No access token available")]
    MissingCredential,

    #[error("Handshake failed: {message}")]
    Handshake { message: String },

    #[error("History fetch failed: {message}")]
    HistoryFetch { message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Message has neither content nor image")]
    EmptyMessage,

    #[error("Malformed message: {message}")]
    Decode { message: String },

    #[error("Malformed frame: {message}")]
    Frame { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatError {
    /// Create a handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a history fetch error
    pub fn history_fetch(message: impl Into<String>) -> Self {
        Self::HistoryFetch {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a frame error
    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Status string shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::MissingCredential => SIGN_IN_REQUIRED_STATUS,
            ChatError::Unauthorized => SESSION_EXPIRED_STATUS,
            ChatError::HistoryFetch { .. } => HISTORY_FAILED_STATUS,
            ChatError::NotConnected => NOT_CONNECTED_STATUS,
            ChatError::EmptyMessage => EMPTY_MESSAGE_STATUS,
            ChatError::Handshake { .. }
            | ChatError::Transport { .. }
            | ChatError::Frame { .. }
            | ChatError::Decode { .. }
            | ChatError::Http(_)
            | ChatError::Configuration { .. }
            | ChatError::Internal { .. } => CONNECT_FAILED_STATUS,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ChatError {
    fn from(err: url::ParseError) -> Self {
        Self::Configuration {
            message: format!("invalid URL: {}", err),
        }
    }
}
