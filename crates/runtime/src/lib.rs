use std::sync::Arc;

use anyhow::{Context, Result};
use orgchat_chat::{
    ChatSession, ConnectionManager, ConnectionSettings, EnvToken, MemoryTokenStore, RestChatApi,
    SessionParams, TokenProvider,
};
use orgchat_config::{AppConfig, AuthConfig};
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Log to stderr so the chat console on stdout stays readable.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything a chat front end needs, built once from configuration.
#[derive(Clone)]
pub struct ChatServices {
    pub tokens: Arc<dyn TokenProvider>,
    pub api: Arc<RestChatApi>,
    pub connections: ConnectionManager,
}

impl ChatServices {
    pub fn initialise(config: &AppConfig) -> Result<Self> {
        Self::with_tokens(config, token_provider(&config.auth))
    }

    pub fn with_tokens(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let api = Arc::new(
            RestChatApi::from_config(config, Arc::clone(&tokens))
                .context("failed to build chat API client")?,
        );
        let settings =
            ConnectionSettings::from_config(config).context("invalid chat socket settings")?;

        info!(
            base_url = %api.base_url(),
            socket_url = %settings.socket_url,
            reconnect = ?settings.reconnect_delay,
            "chat services ready"
        );

        Ok(Self {
            tokens,
            api,
            connections: ConnectionManager::websocket(settings),
        })
    }

    /// A new, idle session for one room.
    pub fn session(&self, params: SessionParams) -> ChatSession {
        ChatSession::new(
            params,
            self.api.clone(),
            Arc::clone(&self.tokens),
            self.connections.clone(),
        )
    }
}

/// Token from configuration if set, otherwise read from the environment
/// variable named by `auth.token_env`.
pub fn token_provider(auth: &AuthConfig) -> Arc<dyn TokenProvider> {
    let configured = auth
        .access_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match configured {
        Some(token) => Arc::new(MemoryTokenStore::with_token(token)),
        None => Arc::new(EnvToken::new(auth.token_env.clone())),
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
