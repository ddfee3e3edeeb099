use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orgchat_config::AppConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use super::HistoryFetcher;
use crate::auth::TokenProvider;
use crate::entities::{ChatMessage, ChatRoom, ImageUpload, UploadResponse};
use crate::types::{ChatError, ChatResult, OrganizationId, RoomId};

/// Client for the chat endpoints of the backend API.
#[derive(Clone)]
pub struct RestChatApi {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestChatApi {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> ChatResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> ChatResult<Self> {
        Self::new(
            config.server.base_url.clone(),
            Duration::from_secs(config.http.request_timeout_seconds),
            tokens,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer token and map 401 to [`ChatError::Unauthorized`].
    async fn execute(&self, request: RequestBuilder) -> ChatResult<Response> {
        let request = match self.tokens.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "request rejected as unauthorized");
            self.tokens.invalidate();
            return Err(ChatError::Unauthorized);
        }

        Ok(response.error_for_status()?)
    }

    /// Rooms of an organization (staff view).
    pub async fn list_chat_rooms(&self, organization_id: OrganizationId) -> ChatResult<Vec<ChatRoom>> {
        let path = format!("/organizations/{organization_id}/chat-rooms");
        let response = self.execute(self.client.get(self.url(&path))).await?;
        decode_list(response).await
    }

    /// The caller's own room in an organization, created with a first
    /// message when it does not exist yet.
    pub async fn get_or_create_my_chat_room(
        &self,
        organization_id: OrganizationId,
        content: &str,
    ) -> ChatResult<ChatRoom> {
        let path = format!("/my-chats/organizations/{organization_id}");
        let request = self.client.post(self.url(&path)).json(&json!({ "content": content }));
        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }

    pub async fn my_chat_messages(&self, room_id: RoomId) -> ChatResult<Vec<ChatMessage>> {
        let path = format!("/my-chats/{room_id}/messages");
        let response = self.execute(self.client.get(self.url(&path))).await?;
        decode_list(response).await
    }

    pub async fn assign_chat_room(
        &self,
        organization_id: OrganizationId,
        room_id: RoomId,
    ) -> ChatResult<()> {
        let path = format!("/organizations/{organization_id}/chat-rooms/{room_id}/assign");
        self.execute(self.client.post(self.url(&path))).await?;
        Ok(())
    }

    pub async fn unassign_chat_room(
        &self,
        organization_id: OrganizationId,
        room_id: RoomId,
    ) -> ChatResult<()> {
        let path = format!("/organizations/{organization_id}/chat-rooms/{room_id}/assign");
        self.execute(self.client.delete(self.url(&path))).await?;
        Ok(())
    }

    /// Upload an image attachment; the returned URL goes into a message.
    pub async fn upload_chat_image(&self, file_name: &str, bytes: Vec<u8>) -> ChatResult<ImageUpload> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part("image", part);

        let request = self.client.post(self.url("/my-chats/upload-image")).multipart(form);
        let body = self.execute(request).await?.text().await?;

        let upload = match serde_json::from_str::<UploadResponse>(&body) {
            Ok(parsed) => ImageUpload::try_from(parsed)?,
            Err(_) if !body.trim().is_empty() && !body.trim_start().starts_with('{') => ImageUpload {
                image_url: body.trim().to_string(),
            },
            Err(err) => return Err(ChatError::decode(format!("unexpected upload response: {err}"))),
        };
        debug!(image_url = %upload.image_url, "chat image uploaded");
        Ok(upload)
    }
}

#[async_trait]
impl HistoryFetcher for RestChatApi {
    async fn fetch_history(
        &self,
        organization_id: OrganizationId,
        room_id: RoomId,
    ) -> ChatResult<Vec<ChatMessage>> {
        let path = format!("/organizations/{organization_id}/chat-rooms/{room_id}/messages");
        let result = match self.execute(self.client.get(self.url(&path))).await {
            Ok(response) => decode_list(response).await,
            Err(err) => Err(err),
        };

        result.map_err(|err| match err {
            ChatError::Unauthorized => err,
            other => ChatError::history_fetch(other.to_string()),
        })
    }
}

/// An empty or `null` body is an empty list.
async fn decode_list<T: DeserializeOwned>(response: Response) -> ChatResult<Vec<T>> {
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let items: Option<Vec<T>> = serde_json::from_slice(&body)?;
    Ok(items.unwrap_or_default())
}
