//! Bearer token providers.
//!
//! The chat client never owns the credential; it asks a [`TokenProvider`]
//! at connect and request time. Blank tokens count as absent everywhere.

use std::sync::RwLock;

use tracing::info;

pub trait TokenProvider: Send + Sync {
    /// Current access token, if signed in.
    fn access_token(&self) -> Option<String>;

    /// The server rejected the token.
    fn invalidate(&self) {}
}

fn non_blank(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.trim().is_empty())
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        non_blank(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    variable: String,
}

impl EnvToken {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
}

impl TokenProvider for EnvToken {
    fn access_token(&self) -> Option<String> {
        non_blank(std::env::var(&self.variable).ok())
    }
}

/// Process-local token store; cleared when the server answers 401.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        let mut slot = self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(token.into());
    }

    pub fn clear(&self) {
        let mut slot = self.token.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

impl TokenProvider for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        let slot = self.token.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        non_blank(slot.clone())
    }

    fn invalidate(&self) {
        info!("access token rejected, signing out");
        self.clear();
    }
}
