use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "orgchat.toml",
    "config/orgchat.toml",
    "crates/config/orgchat.toml",
    "../orgchat.toml",
    "../config/orgchat.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub stomp: StompConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub socket_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            socket_path: "/ws/websocket".to_string(),
        }
    }
}

impl ServerConfig {
    /// WebSocket endpoint derived from the REST base URL.
    ///
    /// ```
    /// use orgchat_config::ServerConfig;
    ///
    /// let server = ServerConfig {
    ///     base_url: "https://api.example.org/".to_string(),
    ///     socket_path: "/ws/websocket".to_string(),
    /// };
    /// assert_eq!(server.socket_url(), "wss://api.example.org/ws/websocket");
    /// ```
    pub fn socket_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };

        format!("{}/{}", base, self.socket_path.trim_start_matches('/'))
    }
}

/// Real-time channel settings.
///
/// ```
/// use orgchat_config::StompConfig;
///
/// let stomp = StompConfig::default();
/// assert_eq!(stomp.heartbeat_outgoing_ms, 4_000);
/// assert_eq!(stomp.reconnect_delay_ms, 5_000);
/// assert_eq!(stomp.publish_destination, "/app/chat");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StompConfig {
    pub heartbeat_outgoing_ms: u64,
    pub heartbeat_incoming_ms: u64,
    /// Zero disables reconnection.
    pub reconnect_delay_ms: u64,
    pub topic_prefix: String,
    pub publish_destination: String,
    #[serde(default = "StompConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl StompConfig {
    const fn default_connect_timeout() -> u64 {
        10
    }
}

impl Default for StompConfig {
    fn default() -> Self {
        Self {
            heartbeat_outgoing_ms: 4_000,
            heartbeat_incoming_ms: 4_000,
            reconnect_delay_ms: 5_000,
            topic_prefix: "/topic/chat-room".to_string(),
            publish_destination: "/app/chat".to_string(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "AuthConfig::default_token_env")]
    pub token_env: String,
}

impl AuthConfig {
    fn default_token_env() -> String {
        "ORGCHAT_ACCESS_TOKEN".to_string()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            token_env: Self::default_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl HttpConfig {
    const fn default_request_timeout() -> u64 {
        30
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

fn as_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the client configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use orgchat_config::load;
///
/// std::env::remove_var("ORGCHAT_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.server.base_url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("server.base_url", defaults.server.base_url.clone())?
        .set_default("server.socket_path", defaults.server.socket_path.clone())?
        .set_default(
            "stomp.heartbeat_outgoing_ms",
            as_i64(defaults.stomp.heartbeat_outgoing_ms),
        )?
        .set_default(
            "stomp.heartbeat_incoming_ms",
            as_i64(defaults.stomp.heartbeat_incoming_ms),
        )?
        .set_default(
            "stomp.reconnect_delay_ms",
            as_i64(defaults.stomp.reconnect_delay_ms),
        )?
        .set_default("stomp.topic_prefix", defaults.stomp.topic_prefix.clone())?
        .set_default(
            "stomp.publish_destination",
            defaults.stomp.publish_destination.clone(),
        )?
        .set_default(
            "stomp.connect_timeout_seconds",
            as_i64(defaults.stomp.connect_timeout_seconds),
        )?
        .set_default("auth.token_env", defaults.auth.token_env.clone())?
        .set_default(
            "http.request_timeout_seconds",
            as_i64(defaults.http.request_timeout_seconds),
        )?;

    let environment_overrides = config::Environment::with_prefix("ORGCHAT").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("ORGCHAT_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via ORGCHAT_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(base_url = %config.server.base_url, "loaded chat client configuration");
    Ok(config)
}
