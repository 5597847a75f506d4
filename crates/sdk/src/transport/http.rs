//! HTTP transport for the X API.
//!
//! Every call is exactly one request. Retrying and budget decisions belong
//! to the caller, which gets the rate-limit headers of every response,
//! successful or not.

use crate::config::ClientConfig;
use crate::error::{ErrorResponse, XError, XResult};
use crate::oauth::{percent_encode, OAuthSigner};
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{multipart, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use xbridge_core::ratelimit::DEFAULT_PENALTY_SECS;
use xbridge_core::{CredentialBundle, RateLimitHeaders};

pub const HEADER_LIMIT: &str = "x-rate-limit-limit";
pub const HEADER_REMAINING: &str = "x-rate-limit-remaining";
pub const HEADER_RESET: &str = "x-rate-limit-reset";

const MEDIA_UPLOAD_PATH: &str = "1.1/media/upload.json";

/// Which credentials a request is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// App-only bearer token when present, otherwise the user's OAuth 1.0a set
    App,
    /// The authenticated user's OAuth 1.0a credentials
    User,
}

/// Decoded response body plus the rate-limit headers that came with it
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub data: T,
    pub rate_limit: RateLimitHeaders,
}

impl<T> Reply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            data: f(self.data),
            rate_limit: self.rate_limit,
        }
    }
}

/// HTTP transport for making API requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
    credentials: Arc<CredentialBundle>,
    signer: Option<OAuthSigner>,
}

impl HttpTransport {
    pub fn new(config: Arc<ClientConfig>, credentials: Arc<CredentialBundle>) -> XResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let signer = credentials.user_context().map(OAuthSigner::new);

        Ok(Self {
            client,
            config,
            credentials,
            signer,
        })
    }

    fn build_url(&self, path: &str) -> XResult<Url> {
        Ok(self.config.api_url.join(path.trim_start_matches('/'))?)
    }

    fn authorization(
        &self,
        method: &Method,
        url: &Url,
        params: &[(String, String)],
        auth: Auth,
    ) -> XResult<String> {
        if auth == Auth::App {
            if let Some(bearer) = self.credentials.bearer() {
                return Ok(format!("Bearer {}", bearer));
            }
        }
        let signer = self.signer.as_ref().ok_or_else(|| {
            XError::MissingCredentials(match auth {
                Auth::App => "a bearer token or OAuth 1.0a user credentials are required",
                Auth::User => "OAuth 1.0a user credentials are required",
            }
            .to_string())
        })?;
        signer.sign(method.as_str(), url.as_str(), params)
    }

    /// Execute a GET request with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: Auth,
    ) -> XResult<Reply<T>> {
        let url = self.build_url(path)?;
        self.send(Method::GET, url, query, None::<&()>, auth).await
    }

    /// Execute a POST request with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> XResult<Reply<T>> {
        let url = self.build_url(path)?;
        self.send(Method::POST, url, &[], Some(body), auth).await
    }

    /// Execute a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> XResult<Reply<T>> {
        let url = self.build_url(path)?;
        self.send(Method::DELETE, url, &[], None::<&()>, auth).await
    }

    /// Upload one media file through the v1.1 multipart endpoint.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> XResult<Reply<T>> {
        let url = self.config.upload_url.join(MEDIA_UPLOAD_PATH)?;
        let authorization = self.authorization(&Method::POST, &url, &[], Auth::User)?;
        let form = multipart::Form::new().part(
            "media",
            multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );

        debug!(url = %url, file = file_name, "Uploading media");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        mut url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
        auth: Auth,
    ) -> XResult<Reply<T>> {
        let params: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        url.set_query(None);
        let authorization = self.authorization(&method, &url, &params, auth)?;
        if !params.is_empty() {
            // Encoded the same way the signature saw them
            let encoded = params
                .iter()
                .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&encoded));
        }

        debug!(method = %method, path = url.path(), "X API request");
        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> XResult<Reply<T>> {
        let status = response.status();
        let rate_limit = rate_limit_from_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_secs(
                response.headers(),
                &rate_limit,
                self.config.clock.now().timestamp(),
            );
            warn!(retry_after, "X API rate limit hit");
            return Err(XError::RateLimited {
                retry_after,
                rate_limit,
            });
        }

        let bytes = response.bytes().await?;

        if status.is_success() {
            let data = if bytes.is_empty() {
                serde_json::from_value(Value::Null)?
            } else {
                serde_json::from_slice(&bytes)?
            };
            return Ok(Reply { data, rate_limit });
        }

        let message = ErrorResponse::message_from(&bytes).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
        Err(XError::Api {
            status: status.as_u16(),
            message,
            rate_limit,
        })
    }
}

/// Read the `x-rate-limit-*` headers; malformed values are ignored.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitHeaders {
    fn parse<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
        headers.get(name)?.to_str().ok()?.trim().parse().ok()
    }

    RateLimitHeaders {
        limit: parse(headers, HEADER_LIMIT),
        remaining: parse(headers, HEADER_REMAINING),
        reset: parse(headers, HEADER_RESET),
    }
}

/// Seconds to wait after a 429: `retry-after`, else time until the window
/// resets, else the default penalty.
fn retry_after_secs(headers: &HeaderMap, rate_limit: &RateLimitHeaders, now: i64) -> u64 {
    let explicit = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(secs) = explicit {
        return secs;
    }
    match rate_limit.reset {
        Some(reset) if reset > now => (reset - now) as u64,
        _ => DEFAULT_PENALTY_SECS,
    }
}
