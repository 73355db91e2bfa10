use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use lesson_core::model::UserId;

/// Credentials presented with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer_token: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    /// Parse an `Authorization` header value. Anything but `Bearer <token>`
    /// yields empty credentials.
    #[must_use]
    pub fn from_authorization_header(value: Option<&str>) -> Self {
        let bearer_token = value
            .and_then(|v| v.trim().strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);
        Self { bearer_token }
    }
}

/// Resolves request credentials to a user.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `None` when the caller is not authenticated.
    async fn resolve(&self, credentials: &Credentials) -> Option<UserId>;
}

/// Fixed token-to-user table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }

    /// Parse `token:user,token:user`. Malformed pairs are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut identity = Self::new();
        for pair in raw.split(',') {
            let Some((token, user)) = pair.split_once(':') else {
                tracing::warn!("ignoring malformed api token entry");
                continue;
            };
            let token = token.trim();
            match user.parse::<UserId>() {
                Ok(user) if !token.is_empty() => identity = identity.with_token(token, user),
                _ => tracing::warn!("ignoring malformed api token entry"),
            }
        }
        identity
    }

    /// Reads `LESSON_API_TOKENS`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("LESSON_API_TOKENS").ok()?;
        let identity = Self::parse(&raw);
        if identity.is_empty() { None } else { Some(identity) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn resolve(&self, credentials: &Credentials) -> Option<UserId> {
        let token = credentials.bearer_token.as_deref()?;
        self.tokens.get(token).cloned()
    }
}
