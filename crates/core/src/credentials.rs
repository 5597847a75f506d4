// Credential context, resolved once before the first tool call

use crate::types::ToolTier;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ENV_API_KEY: &str = "TWITTER_API_KEY";
pub const ENV_API_SECRET: &str = "TWITTER_API_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
pub const ENV_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";

/// Errors decoding an encoded credential bundle
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential bundle is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Credential bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// API credentials for the upstream platform
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialBundle {
    #[serde(default, alias = "api_key", alias = "TWITTER_API_KEY")]
    pub api_key: Option<String>,
    #[serde(default, alias = "api_secret", alias = "TWITTER_API_SECRET")]
    pub api_secret: Option<String>,
    #[serde(default, alias = "access_token", alias = "TWITTER_ACCESS_TOKEN")]
    pub access_token: Option<String>,
    #[serde(
        default,
        alias = "access_token_secret",
        alias = "TWITTER_ACCESS_TOKEN_SECRET"
    )]
    pub access_token_secret: Option<String>,
    #[serde(default, alias = "bearer_token", alias = "TWITTER_BEARER_TOKEN")]
    pub bearer_token: Option<String>,
}

/// Borrowed OAuth 1.0a credential set
#[derive(Clone, Copy)]
pub struct UserContext<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub access_token: &'a str,
    pub access_token_secret: &'a str,
}

impl CredentialBundle {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).and_then(non_blank);
        Self {
            api_key: read(ENV_API_KEY),
            api_secret: read(ENV_API_SECRET),
            access_token: read(ENV_ACCESS_TOKEN),
            access_token_secret: read(ENV_ACCESS_TOKEN_SECRET),
            bearer_token: read(ENV_BEARER_TOKEN),
        }
    }

    /// Decode a base64-encoded JSON bundle (camelCase, snake_case or env-style keys).
    pub fn from_base64_json(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = BASE64.decode(encoded.trim())?;
        let bundle: Self = serde_json::from_slice(&bytes)?;
        Ok(bundle.normalized())
    }

    /// Fill any field missing here from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            api_key: self.api_key.or(fallback.api_key),
            api_secret: self.api_secret.or(fallback.api_secret),
            access_token: self.access_token.or(fallback.access_token),
            access_token_secret: self.access_token_secret.or(fallback.access_token_secret),
            bearer_token: self.bearer_token.or(fallback.bearer_token),
        }
    }

    fn normalized(self) -> Self {
        Self {
            api_key: self.api_key.and_then(non_blank),
            api_secret: self.api_secret.and_then(non_blank),
            access_token: self.access_token.and_then(non_blank),
            access_token_secret: self.access_token_secret.and_then(non_blank),
            bearer_token: self.bearer_token.and_then(non_blank),
        }
    }

    pub fn user_context(&self) -> Option<UserContext<'_>> {
        Some(UserContext {
            consumer_key: self.api_key.as_deref()?,
            consumer_secret: self.api_secret.as_deref()?,
            access_token: self.access_token.as_deref()?,
            access_token_secret: self.access_token_secret.as_deref()?,
        })
    }

    pub fn has_user_context(&self) -> bool {
        self.user_context().is_some()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.missing_fields().len() == 5
    }

    /// Environment variable names that are unset.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            (ENV_API_KEY, self.api_key.is_none()),
            (ENV_API_SECRET, self.api_secret.is_none()),
            (ENV_ACCESS_TOKEN, self.access_token.is_none()),
            (ENV_ACCESS_TOKEN_SECRET, self.access_token_secret.is_none()),
            (ENV_BEARER_TOKEN, self.bearer_token.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }

    /// Whether a tool of `tier` can run with these credentials.
    pub fn satisfies(&self, tier: ToolTier) -> bool {
        match tier {
            ToolTier::ReadOnly => self.has_user_context() || self.bearer_token.is_some(),
            ToolTier::UserContext => self.has_user_context(),
        }
    }

    /// Fields that would have to be supplied for `tier`.
    pub fn missing_for(&self, tier: ToolTier) -> Vec<&'static str> {
        if self.satisfies(tier) {
            return Vec::new();
        }
        let missing = self.missing_fields();
        match tier {
            ToolTier::UserContext => missing
                .into_iter()
                .filter(|name| *name != ENV_BEARER_TOKEN)
                .collect(),
            ToolTier::ReadOnly => vec![ENV_BEARER_TOKEN],
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("CredentialBundle")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &mask(&self.api_secret))
            .field("access_token", &mask(&self.access_token))
            .field("access_token_secret", &mask(&self.access_token_secret))
            .field("bearer_token", &mask(&self.bearer_token))
            .finish()
    }
}
