use std::env;

use anyhow::Result;
use httpmock::prelude::*;
use orgchat_chat::types::errors::SIGN_IN_REQUIRED_STATUS;
use orgchat_chat::{SenderRole, SessionParams, SessionState, TokenProvider};
use orgchat_config::AppConfig;
use orgchat_runtime::{token_provider, ChatServices};
use serial_test::serial;

const TOKEN_ENV: &str = "ORGCHAT_RUNTIME_TEST_TOKEN";

fn build_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.base_url = base_url.to_string();
    config.auth.token_env = TOKEN_ENV.to_string();
    config
}

#[test]
#[serial]
fn configured_token_wins_over_environment() {
    env::set_var(TOKEN_ENV, "from-env");
    let mut config = build_config("http://localhost:8080");
    config.auth.access_token = Some("from-config".into());

    let tokens = token_provider(&config.auth);
    assert_eq!(tokens.access_token().as_deref(), Some("from-config"));
    env::remove_var(TOKEN_ENV);
}

#[test]
#[serial]
fn environment_token_is_read_lazily() {
    env::remove_var(TOKEN_ENV);
    let mut config = build_config("http://localhost:8080");
    config.auth.access_token = Some("   ".into());

    let tokens = token_provider(&config.auth);
    assert_eq!(tokens.access_token(), None);

    env::set_var(TOKEN_ENV, "late-token");
    assert_eq!(tokens.access_token().as_deref(), Some("late-token"));
    env::remove_var(TOKEN_ENV);
}

#[tokio::test]
#[serial]
async fn initialise_derives_socket_endpoint_from_base_url() -> Result<()> {
    let mut config = build_config("https://chat.example.org/");
    config.stomp.reconnect_delay_ms = 0;

    let services = ChatServices::initialise(&config)?;
    let settings = services.connections.settings();

    assert_eq!(services.api.base_url(), "https://chat.example.org");
    assert_eq!(
        settings.socket_url.as_str(),
        "wss://chat.example.org/ws/websocket"
    );
    assert_eq!(settings.reconnect_delay, None);
    Ok(())
}

#[tokio::test]
#[serial]
async fn initialise_rejects_unusable_base_url() {
    let config = build_config("not a url");
    let error = match ChatServices::initialise(&config) {
        Ok(_) => panic!("expected invalid socket settings"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("invalid chat socket settings"),
        "unexpected error {message}"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn session_loads_history_then_requires_sign_in() -> Result<()> {
    env::remove_var(TOKEN_ENV);
    let server = MockServer::start_async().await;
    let history = server
        .mock_async(|when, then| {
            when.method(GET).path("/organizations/1/chat-rooms/2/messages");
            then.status(200).json_body(serde_json::json!([
                { "roomId": 2, "content": "welcome", "senderIsAdmin": true }
            ]));
        })
        .await;

    let services = ChatServices::initialise(&build_config(&server.base_url()))?;
    let mut session = services.session(SessionParams::new(1, 2, SenderRole::Member));
    assert_eq!(session.state(), SessionState::Idle);

    session.connect().await;

    history.assert_async().await;
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].content, "welcome");
    assert_eq!(session.state(), SessionState::Error);
    assert!(!session.is_connecting());
    assert_eq!(session.error_message(), Some(SIGN_IN_REQUIRED_STATUS));
    Ok(())
}
