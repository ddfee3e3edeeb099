//! REST client tests against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use orgchat_chat::{
    ChatError, HistoryFetcher, MemoryTokenStore, RestChatApi, SenderRole, StaticToken,
    TokenProvider,
};
use serde_json::json;

fn api(server: &MockServer, tokens: Arc<dyn TokenProvider>) -> RestChatApi {
    RestChatApi::new(server.base_url(), Duration::from_secs(2), tokens).unwrap()
}

#[tokio::test]
async fn fetch_history_returns_messages_in_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/organizations/3/chat-rooms/7/messages")
                .header("Authorization", "Bearer secret");
            then.status(200).json_body(json!([
                { "id": 1, "roomId": 7, "content": "first", "imageUrl": null, "senderIsAdmin": false },
                { "id": 2, "roomId": 7, "content": "", "imageUrl": "https://cdn.test/b.png", "admin": true }
            ]));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let messages = api.fetch_history(3, 7).await.expect("history should load");

    mock.assert_async().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "first");
    assert_eq!(messages[0].role(), SenderRole::Member);
    assert!(messages[1].has_image());
    assert_eq!(messages[1].role(), SenderRole::Admin);
}

#[tokio::test]
async fn history_with_mixed_role_spellings_loads() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms/7/messages");
            then.status(200).json_body(json!([
                { "id": 1, "roomId": 7, "content": "a", "senderIsAdmin": true, "admin": true },
                { "id": 2, "roomId": 7, "content": "b", "senderIsAdmin": false, "isAdmin": false }
            ]));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let messages = api.fetch_history(3, 7).await.expect("history should load");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), SenderRole::Admin);
    assert_eq!(messages[1].role(), SenderRole::Member);
}

#[tokio::test]
async fn null_history_is_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms/7/messages");
            then.status(200)
                .header("Content-Type", "application/json")
                .body("null");
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    assert!(api.fetch_history(3, 7).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_server_error_is_history_fetch_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms/7/messages");
            then.status(500);
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let err = api.fetch_history(3, 7).await.unwrap_err();
    assert!(matches!(err, ChatError::HistoryFetch { .. }));
}

#[tokio::test]
async fn unauthorized_invalidates_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms/7/messages");
            then.status(401);
        })
        .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("stale"));
    let api = api(&server, tokens.clone());

    let err = api.fetch_history(3, 7).await.unwrap_err();
    assert!(matches!(err, ChatError::Unauthorized));
    assert!(!tokens.is_authenticated());
}

#[tokio::test]
async fn requests_without_token_omit_authorization() {
    let server = MockServer::start_async().await;
    let authorized = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/organizations/3/chat-rooms")
                .header_exists("Authorization");
            then.status(200).json_body(json!([]));
        })
        .await;
    let anonymous = server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms");
            then.status(200).json_body(json!([{ "roomId": 5 }]));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::none()));
    let rooms = api.list_chat_rooms(3).await.unwrap();

    assert_eq!(authorized.hits_async().await, 0);
    assert_eq!(anonymous.hits_async().await, 1);
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, 5);
}

#[tokio::test]
async fn list_chat_rooms_keeps_extra_fields() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/3/chat-rooms");
            then.status(200).json_body(json!([
                { "id": 10, "organizationId": 3, "memberName": "Kim", "unreadCount": 2 }
            ]));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let rooms = api.list_chat_rooms(3).await.unwrap();

    assert_eq!(rooms[0].id, 10);
    assert_eq!(rooms[0].organization_id, Some(3));
    assert_eq!(rooms[0].extra.get("unreadCount"), Some(&json!(2)));
}

#[tokio::test]
async fn get_or_create_my_chat_room_posts_first_message() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/my-chats/organizations/3")
                .json_body(json!({ "content": "hello staff" }));
            then.status(200).json_body(json!({ "id": 42, "organizationId": 3 }));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let room = api.get_or_create_my_chat_room(3, "hello staff").await.unwrap();

    mock.assert_async().await;
    assert_eq!(room.id, 42);
}

#[tokio::test]
async fn my_chat_messages_reads_member_endpoint() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/my-chats/42/messages");
            then.status(200)
                .json_body(json!([{ "content": "hi", "senderIsAdmin": true }]));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let messages = api.my_chat_messages(42).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].sender_is_admin);
}

#[tokio::test]
async fn assign_and_unassign_use_post_and_delete() {
    let server = MockServer::start_async().await;
    let assign = server
        .mock_async(|when, then| {
            when.method(POST).path("/organizations/3/chat-rooms/7/assign");
            then.status(200);
        })
        .await;
    let unassign = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/organizations/3/chat-rooms/7/assign");
            then.status(204);
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    api.assign_chat_room(3, 7).await.unwrap();
    api.unassign_chat_room(3, 7).await.unwrap();

    assign.assert_async().await;
    unassign.assert_async().await;
}

#[tokio::test]
async fn assign_conflict_is_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/organizations/3/chat-rooms/7/assign");
            then.status(409);
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let err = api.assign_chat_room(3, 7).await.unwrap_err();
    assert!(matches!(err, ChatError::Http(_)));
}

#[tokio::test]
async fn upload_sends_multipart_image_field() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/my-chats/upload-image")
                .body_contains("name=\"image\"")
                .body_contains("filename=\"cat.png\"")
                .body_contains("image/png");
            then.status(200).json_body(json!({ "imageUrl": "https://cdn.test/cat.png" }));
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let upload = api
        .upload_chat_image("cat.png", b"not really a png".to_vec())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(upload.image_url, "https://cdn.test/cat.png");
}

#[tokio::test]
async fn upload_accepts_bare_url_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/my-chats/upload-image");
            then.status(200).body("https://cdn.test/raw.jpg");
        })
        .await;

    let api = api(&server, Arc::new(StaticToken::new("secret")));
    let upload = api.upload_chat_image("raw.jpg", vec![1, 2, 3]).await.unwrap();
    assert_eq!(upload.image_url, "https://cdn.test/raw.jpg");
}
