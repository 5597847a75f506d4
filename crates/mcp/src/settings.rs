// Server settings, loaded from an optional TOML file

use crate::dispatcher::{DispatchConfig, Dispatcher};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use xbridge_core::ratelimit::DEFAULT_PENALTY_SECS;
use xbridge_core::{Clock, CredentialBundle, Quota, RateLimitGovernor, RetryConfig};
use xbridge_sdk::config::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use xbridge_sdk::XClient;

/// Settings that make no sense together
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("rate limit for {0} is configured more than once")]
    DuplicateQuota(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    /// Local budgets; replaces the built-in list when present
    #[serde(default = "Quota::defaults")]
    pub rate_limits: Vec<Quota>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream: UpstreamSettings::default(),
            retry: RetryConfig::default(),
            dispatch: DispatchSettings::default(),
            auth: AuthSettings::default(),
            rate_limits: Quota::defaults(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Media upload host; derived from `api_url` when unset
    #[serde(default)]
    pub upload_url: Option<String>,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            upload_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Longest exhausted-bucket wait slept through instead of failing
    #[serde(default = "default_max_clearance_wait_secs")]
    pub max_clearance_wait_secs: u64,

    /// Bound on a whole upstream attempt, compound operations included
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Penalty for a rate-limit rejection that carries no retry hint
    #[serde(default = "default_penalty_secs")]
    pub default_penalty_secs: u64,
}

fn default_max_clearance_wait_secs() -> u64 {
    5
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_penalty_secs() -> u64 {
    DEFAULT_PENALTY_SECS
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_clearance_wait_secs: default_max_clearance_wait_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            default_penalty_secs: default_penalty_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Require OAuth 1.0a user context for every tool, reads included
    #[serde(default)]
    pub read_requires_user_context: bool,
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Self = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse configuration file {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "Configuration file not found, using defaults");
            Self::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Zero("upstream.timeout_secs"));
        }
        if self.dispatch.call_timeout_secs == 0 {
            return Err(ConfigError::Zero("dispatch.call_timeout_secs"));
        }
        let mut seen = HashSet::new();
        for quota in &self.rate_limits {
            if quota.limit == 0 {
                return Err(ConfigError::Zero("rate_limits.limit"));
            }
            if quota.window_secs == 0 {
                return Err(ConfigError::Zero("rate_limits.window_secs"));
            }
            if !seen.insert(quota.category) {
                return Err(ConfigError::DuplicateQuota(quota.category.to_string()));
            }
        }
        Ok(())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            retry: self.retry.clone(),
            max_clearance_wait: Duration::from_secs(self.dispatch.max_clearance_wait_secs),
            call_timeout: Duration::from_secs(self.dispatch.call_timeout_secs),
            read_requires_user_context: self.auth.read_requires_user_context,
        }
    }

    pub fn governor(&self, clock: Arc<dyn Clock>) -> RateLimitGovernor {
        RateLimitGovernor::new(clock)
            .with_quotas(self.rate_limits.iter().copied())
            .with_penalty(self.dispatch.default_penalty_secs)
    }

    pub fn client(&self, credentials: CredentialBundle, clock: Arc<dyn Clock>) -> Result<XClient> {
        let mut builder = XClient::builder()
            .api_url(&self.upstream.api_url)
            .timeout(Duration::from_secs(self.upstream.timeout_secs))
            .credentials(credentials)
            .clock(clock);
        if let Some(upload_url) = &self.upstream.upload_url {
            builder = builder.upload_url(upload_url);
        }
        builder.build().context("Failed to build X API client")
    }

    /// Wire the registry, governor and client into a dispatcher.
    pub fn build_dispatcher(
        &self,
        credentials: CredentialBundle,
        clock: Arc<dyn Clock>,
    ) -> Result<Dispatcher> {
        let credentials = Arc::new(credentials);
        let client = self.client(credentials.as_ref().clone(), Arc::clone(&clock))?;
        Ok(Dispatcher::new(
            Arc::new(ToolRegistry::with_catalog()),
            Arc::new(self.governor(clock)),
            Arc::new(client),
            credentials,
            self.dispatch_config(),
        ))
    }
}
