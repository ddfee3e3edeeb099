//! Shared fixtures for the chat integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orgchat_chat::stomp::Heartbeat;
use orgchat_chat::transport::MemoryConnector;
use orgchat_chat::{
    ChatError, ChatMessage, ChatResult, ChatSession, ConnectionManager, ConnectionSettings,
    HistoryFetcher, OrganizationId, RoomId, SenderRole, SessionParams, TokenProvider,
};
use url::Url;

pub const ORG: OrganizationId = 3;
pub const ROOM: RoomId = 7;
pub const TOPIC: &str = "/topic/chat-room/7";
pub const TOKEN: &str = "test-token";

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Settings without heart-beats; `reconnect` in milliseconds.
pub fn settings(reconnect_ms: Option<u64>) -> ConnectionSettings {
    let url = Url::parse("ws://chat.test/ws/websocket").unwrap();
    let mut settings = ConnectionSettings::new(url).unwrap();
    settings.heartbeat = Heartbeat::from_millis(0, 0);
    settings.reconnect_delay = reconnect_ms.map(Duration::from_millis);
    settings.connect_timeout = Duration::from_secs(2);
    settings
}

pub fn manager(connector: &MemoryConnector, settings: ConnectionSettings) -> ConnectionManager {
    ConnectionManager::new(settings, Arc::new(connector.clone()))
}

pub fn message(content: &str) -> ChatMessage {
    ChatMessage::new(ROOM, content, SenderRole::Member)
}

pub fn echo(content: &str) -> String {
    serde_json::json!({
        "roomId": ROOM,
        "content": content,
        "imageUrl": null,
        "senderIsAdmin": false
    })
    .to_string()
}

pub fn contents(session: &ChatSession) -> Vec<&str> {
    session
        .messages()
        .iter()
        .map(|message| message.content.as_str())
        .collect()
}

pub struct StubHistory {
    messages: Option<Vec<ChatMessage>>,
    calls: AtomicUsize,
}

impl StubHistory {
    pub fn with(messages: Vec<ChatMessage>) -> Arc<Self> {
        Arc::new(Self {
            messages: Some(messages),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            messages: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryFetcher for StubHistory {
    async fn fetch_history(
        &self,
        _organization_id: OrganizationId,
        _room_id: RoomId,
    ) -> ChatResult<Vec<ChatMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages
            .clone()
            .ok_or_else(|| ChatError::history_fetch("backend unavailable"))
    }
}

pub fn session(
    connector: &MemoryConnector,
    history: Arc<StubHistory>,
    tokens: Arc<dyn TokenProvider>,
    role: SenderRole,
    reconnect_ms: Option<u64>,
) -> ChatSession {
    ChatSession::new(
        SessionParams::new(ORG, ROOM, role),
        history,
        tokens,
        manager(connector, settings(reconnect_ms)),
    )
}
