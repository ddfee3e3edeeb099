//! Per-room chat session.
//!
//! A [`ChatSession`] is an explicit state machine:
//!
//! ```text
//! idle -> loadingHistory -> connecting -> connected
//!              |                |  ^          |
//!              +-----> error <--+  +--------- + (drop, reconnect)
//! ```
//!
//! `disconnect()` returns to `idle` from anywhere. History is always loaded
//! before the connection is opened, so the message view holds the backlog
//! before the first live message can be appended.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::HistoryFetcher;
use crate::auth::TokenProvider;
use crate::entities::{ChatMessage, OutboundMessage};
use crate::services::{ConnectionHandle, ConnectionManager, MessageChannel};
use crate::types::errors::{CONNECTION_LOST_STATUS, HISTORY_FAILED_STATUS};
use crate::types::{
    ChatError, ChatResult, ConnectionEvent, OrganizationId, RoomId, SenderRole, SessionUpdate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoadingHistory,
    Connecting,
    Connected,
    Error,
}

/// Which room a session talks to and as whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub organization_id: Option<OrganizationId>,
    pub room_id: Option<RoomId>,
    pub role: SenderRole,
}

impl SessionParams {
    pub fn new(organization_id: OrganizationId, room_id: RoomId, role: SenderRole) -> Self {
        Self {
            organization_id: Some(organization_id),
            room_id: Some(room_id),
            role,
        }
    }
}

pub struct ChatSession {
    params: SessionParams,
    state: SessionState,
    messages: Vec<ChatMessage>,
    history_error: Option<String>,
    connection_error: Option<String>,
    history: Arc<dyn HistoryFetcher>,
    tokens: Arc<dyn TokenProvider>,
    connections: ConnectionManager,
    handle: Option<ConnectionHandle>,
}

impl ChatSession {
    pub fn new(
        params: SessionParams,
        history: Arc<dyn HistoryFetcher>,
        tokens: Arc<dyn TokenProvider>,
        connections: ConnectionManager,
    ) -> Self {
        Self {
            params,
            state: SessionState::Idle,
            messages: Vec::new(),
            history_error: None,
            connection_error: None,
            history,
            tokens,
            connections,
            handle: None,
        }
    }

    /// Load the room history, then open the live connection.
    ///
    /// Does nothing while already connecting or connected, or when the
    /// organization or room is unknown.
    pub async fn connect(&mut self) {
        if matches!(self.state, SessionState::Connecting | SessionState::Connected) {
            debug!(state = ?self.state, "connect ignored, session already active");
            return;
        }
        let (Some(organization_id), Some(room_id)) =
            (self.params.organization_id, self.params.room_id)
        else {
            debug!("connect ignored, organization or room not selected");
            return;
        };

        if let Some(mut stale) = self.handle.take() {
            stale.close();
        }
        self.history_error = None;
        self.connection_error = None;

        self.state = SessionState::LoadingHistory;
        match self.history.fetch_history(organization_id, room_id).await {
            Ok(messages) => {
                info!(organization_id, room_id, count = messages.len(), "chat history loaded");
                self.messages = messages;
            }
            Err(err) => {
                warn!(organization_id, room_id, error = %err, "chat history unavailable");
                let status = if matches!(err, ChatError::Unauthorized) {
                    err.user_message()
                } else {
                    HISTORY_FAILED_STATUS
                };
                self.history_error = Some(status.to_string());
            }
        }

        let token = self.tokens.access_token();
        match self.connections.open(room_id, token.as_deref()) {
            Ok(handle) => {
                self.state = SessionState::Connecting;
                self.handle = Some(handle);
            }
            Err(err) => self.fail(&err),
        }
    }

    /// Wait for the next connection event and apply it.
    /// `None` when there is no connection to listen to.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        let handle = self.handle.as_mut()?;
        let event = handle.next_event().await.unwrap_or(ConnectionEvent::Closed);
        Some(self.dispatch(event))
    }

    /// Apply one connection event to the session.
    pub fn dispatch(&mut self, event: ConnectionEvent) -> SessionUpdate {
        if self.handle.is_none() {
            debug!(?event, "event after disconnect ignored");
            return SessionUpdate::Ignored;
        }

        match event {
            ConnectionEvent::Opened => {
                self.state = SessionState::Connected;
                self.connection_error = None;
                SessionUpdate::Connected
            }
            ConnectionEvent::Message(message) => {
                if self.state != SessionState::Connected {
                    debug!(state = ?self.state, "live message outside connected state dropped");
                    return SessionUpdate::Ignored;
                }
                self.messages.push(message);
                SessionUpdate::MessageAppended {
                    index: self.messages.len() - 1,
                }
            }
            ConnectionEvent::Failed(err) => {
                self.fail(&err);
                SessionUpdate::Failed {
                    status: err.user_message().to_string(),
                }
            }
            ConnectionEvent::Dropped => {
                self.state = SessionState::Connecting;
                SessionUpdate::Reconnecting
            }
            ConnectionEvent::Closed => {
                self.handle = None;
                self.state = SessionState::Error;
                if self.connection_error.is_none() {
                    self.connection_error = Some(CONNECTION_LOST_STATUS.to_string());
                }
                SessionUpdate::Closed
            }
        }
    }

    /// Publish a message in this session's role. The sent message is not
    /// appended here; it shows up when the server echoes it.
    pub fn try_send_message(&self, content: &str, image_url: Option<&str>) -> ChatResult<()> {
        let handle = match (&self.handle, self.state) {
            (Some(handle), SessionState::Connected) => handle,
            _ => return Err(ChatError::NotConnected),
        };

        let message = OutboundMessage::new(handle.room_id(), content, image_url, self.params.role);
        MessageChannel::publish(handle, &message)
    }

    pub fn send_message(&self, content: &str, image_url: Option<&str>) -> bool {
        match self.try_send_message(content, image_url) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "chat message not sent");
                false
            }
        }
    }

    /// Tear down the connection and return to idle. Safe to repeat.
    pub fn disconnect(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            info!(room_id = handle.room_id(), "chat session disconnected");
        }
        self.state = SessionState::Idle;
        self.history_error = None;
        self.connection_error = None;
    }

    fn fail(&mut self, err: &ChatError) {
        warn!(error = %err, "chat connection failed");
        self.state = SessionState::Error;
        self.connection_error = Some(err.user_message().to_string());
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state == SessionState::Connecting
    }

    pub fn is_loading_history(&self) -> bool {
        self.state == SessionState::LoadingHistory
    }

    /// Status line for the UI: connection problems first, then history.
    pub fn error_message(&self) -> Option<&str> {
        self.connection_error
            .as_deref()
            .or(self.history_error.as_deref())
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
