//! Configuration types for the X API client.

use std::sync::Arc;
use std::time::Duration;
use url::Url;
use xbridge_core::{Clock, SystemClock};

pub const DEFAULT_API_URL: &str = "https://api.twitter.com/";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.twitter.com/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the X client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for v2 and v1.1 REST endpoints.
    pub api_url: Url,
    /// Base URL for the media upload endpoint.
    pub upload_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Time source for retry hints and locally stamped timestamps.
    pub clock: Arc<dyn Clock>,
}

impl ClientConfig {
    /// Create a configuration with the given API base URL.
    ///
    /// Media uploads go to the same host unless
    /// [`with_upload_url`](Self::with_upload_url) is used.
    pub fn new(api_url: Url) -> Self {
        Self {
            upload_url: api_url.clone(),
            api_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("xbridge/", env!("CARGO_PKG_VERSION")).to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_upload_url(mut self, upload_url: Url) -> Self {
        self.upload_url = upload_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Ensure a base URL ends with `/` so relative joins keep its path.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_defaults() {
        let config = ClientConfig::new(Url::parse(DEFAULT_API_URL).unwrap())
            .with_upload_url(Url::parse(DEFAULT_UPLOAD_URL).unwrap());

        assert_eq!(config.api_url.as_str(), "https://api.twitter.com/");
        assert_eq!(config.upload_url.as_str(), "https://upload.twitter.com/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("xbridge/"));
    }

    #[test]
    fn test_new_uploads_to_same_host() {
        let url = Url::parse("http://localhost:9000/").unwrap();
        let config = ClientConfig::new(url.clone()).with_timeout(Duration::from_secs(5));

        assert_eq!(config.upload_url, url);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_trailing_slash_added() {
        let url = Url::parse("http://localhost:9000/proxy").unwrap();
        assert_eq!(
            with_trailing_slash(url).join("2/users/me").unwrap().as_str(),
            "http://localhost:9000/proxy/2/users/me"
        );
    }
}
