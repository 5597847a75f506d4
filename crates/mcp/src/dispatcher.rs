// Tool invocation pipeline

use crate::adapter::UpstreamAdapter;
use crate::tools::{redacted_arguments, ToolDefinition, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use xbridge_core::{
    Category, Clearance, CredentialBundle, Operation, RateLimitGovernor, RetryConfig, ToolError,
    ToolResult, ToolTier, Upstream, UpstreamReply,
};

/// Knobs for the invocation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub retry: RetryConfig,
    /// Longest a call may wait for its rate-limit window to reopen
    pub max_clearance_wait: Duration,
    /// Upper bound on one upstream attempt, compound operations included
    pub call_timeout: Duration,
    /// Demand full user credentials even for read-only tools
    pub read_requires_user_context: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_clearance_wait: Duration::from_secs(5),
            call_timeout: Duration::from_secs(120),
            read_requires_user_context: false,
        }
    }
}

/// A tool call as received from the client
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    governor: Arc<RateLimitGovernor>,
    adapter: UpstreamAdapter,
    credentials: Arc<CredentialBundle>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        governor: Arc<RateLimitGovernor>,
        upstream: Arc<dyn Upstream>,
        credentials: Arc<CredentialBundle>,
        config: DispatchConfig,
    ) -> Self {
        let adapter = UpstreamAdapter::new(upstream, Arc::clone(&governor), config.call_timeout);
        Self {
            registry,
            governor,
            adapter,
            credentials,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn governor(&self) -> &RateLimitGovernor {
        &self.governor
    }

    /// Run one tool invocation to completion.
    pub async fn invoke(&self, invocation: ToolInvocation) -> ToolResult {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("tool", name = %invocation.name, id = %invocation_id);
        let started = Instant::now();

        let outcome = self.run(&invocation).instrument(span.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &outcome {
            Ok(result) => info!(
                parent: &span,
                elapsed_ms,
                provenance = ?result.provenance,
                "Tool call succeeded"
            ),
            Err(e) => warn!(
                parent: &span,
                elapsed_ms,
                kind = %e.kind(),
                error = %e,
                "Tool call failed"
            ),
        }
        ToolResult::from(outcome)
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolResult, ToolError> {
        let tool = self.registry.lookup(&invocation.name)?;
        let args = tool.schema.validate(&invocation.arguments)?;
        debug!(arguments = %redacted_arguments(&args, &tool.schema), "Arguments accepted");

        let operation = (tool.build)(&args)?;
        self.check_credentials(tool)?;

        let reply = self.call_with_retry(tool.category, &operation).await?;
        let payload = (tool.shape)(&reply.payload, &args);

        Ok(ToolResult::ok(payload, operation.provenance()).with_warning(operation.warning()))
    }

    fn required_tier(&self, tool: &ToolDefinition) -> ToolTier {
        if self.config.read_requires_user_context {
            ToolTier::UserContext
        } else {
            tool.tier
        }
    }

    fn check_credentials(&self, tool: &ToolDefinition) -> Result<(), ToolError> {
        let tier = self.required_tier(tool);
        if self.credentials.satisfies(tier) {
            return Ok(());
        }
        let missing = self.credentials.missing_for(tier);
        Err(ToolError::Auth(format!(
            "{} needs {} credentials; missing {}",
            tool.name,
            match tier {
                ToolTier::ReadOnly => "app or user",
                ToolTier::UserContext => "user-context",
            },
            missing.join(", ")
        )))
    }

    async fn call_with_retry(
        &self,
        category: Category,
        operation: &Operation,
    ) -> Result<UpstreamReply, ToolError> {
        let simulated = operation.simulated_payload().is_some();
        let mut attempt = 0;

        loop {
            if !simulated {
                self.acquire_clearance(category).await?;
            }

            match self.adapter.call(category, operation.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    let backoff = self.config.retry.backoff_for_attempt(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait for budget in `category`, or fail when the wait is too long.
    async fn acquire_clearance(&self, category: Category) -> Result<(), ToolError> {
        let until = match self.governor.check_clearance(category) {
            Clearance::Proceed | Clearance::Unknown => return Ok(()),
            Clearance::WaitUntil(until) => until,
        };

        let wait = self.until(until);
        if wait > self.config.max_clearance_wait {
            return Err(ToolError::RateLimited {
                retry_after: whole_secs(wait),
            });
        }

        debug!(%category, wait_ms = wait.as_millis() as u64, "Waiting for rate limit window");
        tokio::time::sleep(wait).await;

        match self.governor.check_clearance(category) {
            Clearance::Proceed | Clearance::Unknown => Ok(()),
            Clearance::WaitUntil(until) => Err(ToolError::RateLimited {
                retry_after: whole_secs(self.until(until)),
            }),
        }
    }

    fn until(&self, instant: chrono::DateTime<chrono::Utc>) -> Duration {
        (instant - self.governor.now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Seconds to wait, rounded up and never zero.
fn whole_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use xbridge_core::{
        BucketState, ErrorKind, ManualClock, Observation, Provenance, RateLimitHeaders,
        UpstreamError,
    };

    type Scripted = Result<UpstreamReply, UpstreamError>;

    /// Upstream that replays scripted outcomes and records every call.
    #[derive(Default)]
    struct FakeUpstream {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<Operation>>,
    }

    impl FakeUpstream {
        fn with(outcomes: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.into()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<Operation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn execute(&self, operation: &Operation) -> Result<UpstreamReply, UpstreamError> {
            self.calls.lock().unwrap().push(operation.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(UpstreamReply::new(json!({"data": {}}))))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
    }

    fn user_credentials() -> CredentialBundle {
        CredentialBundle::from_lookup(|key| match key {
            "TWITTER_API_KEY" => Some("key".into()),
            "TWITTER_API_SECRET" => Some("secret".into()),
            "TWITTER_ACCESS_TOKEN" => Some("token".into()),
            "TWITTER_ACCESS_TOKEN_SECRET" => Some("token-secret".into()),
            _ => None,
        })
    }

    fn bearer_only() -> CredentialBundle {
        CredentialBundle::from_lookup(|key| {
            (key == "TWITTER_BEARER_TOKEN").then(|| "bearer".to_string())
        })
    }

    struct Harness {
        dispatcher: Arc<Dispatcher>,
        upstream: Arc<FakeUpstream>,
        clock: Arc<ManualClock>,
        governor: Arc<RateLimitGovernor>,
    }

    fn harness_with(
        upstream: Arc<FakeUpstream>,
        credentials: CredentialBundle,
        config: DispatchConfig,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new(start()));
        let governor = Arc::new(RateLimitGovernor::new(clock.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(ToolRegistry::with_catalog()),
            governor.clone(),
            upstream.clone(),
            Arc::new(credentials),
            config,
        ));
        Harness {
            dispatcher,
            upstream,
            clock,
            governor,
        }
    }

    fn harness(upstream: Arc<FakeUpstream>) -> Harness {
        let config = DispatchConfig {
            retry: RetryConfig {
                initial_backoff_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        harness_with(upstream, user_credentials(), config)
    }

    fn transient() -> Scripted {
        Err(UpstreamError::new(ToolError::Transient("HTTP 503".into())))
    }

    #[tokio::test]
    async fn test_post_tweet() {
        let upstream = FakeUpstream::with(vec![Ok(UpstreamReply::new(json!({"data": {
            "id": "1790000000000000000",
            "text": "Hello",
            "created_at": "2026-05-04T10:00:00.000Z",
            "author_id": "42"
        }}))
        .with_rate_limit(RateLimitHeaders {
            limit: Some(200),
            remaining: Some(199),
            reset: Some(start().timestamp() + 900),
        }))]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("post_tweet", json!({"text": "Hello"})))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.provenance, Some(Provenance::Upstream));
        assert!(result.warning.is_none());
        let payload = result.payload.unwrap();
        assert_eq!(payload["text"], json!("Hello"));
        assert_eq!(payload["id"], json!("1790000000000000000"));
        assert_eq!(payload["authorId"], json!("42"));
        assert!(payload["createdAt"].is_string());

        assert_eq!(
            h.upstream.calls(),
            vec![Operation::PostTweet(xbridge_core::NewTweet::text("Hello"))]
        );
        let bucket = h.governor.snapshot(Category::TweetWrite).unwrap();
        assert_eq!(bucket.remaining, 199);
        assert_eq!(bucket.limit, Some(200));
    }

    #[tokio::test]
    async fn test_search_rate_limited() {
        let upstream = FakeUpstream::with(vec![Err(UpstreamError::new(
            ToolError::RateLimited { retry_after: 900 },
        ))]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("search_twitter", json!({"query": "rust"})))
            .await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(error.retry_after, Some(900));
        assert_eq!(h.upstream.calls().len(), 1);

        let bucket = h.governor.snapshot(Category::Search).unwrap();
        assert_eq!(bucket.remaining, 0);
        assert_eq!(bucket.reset_at, start() + chrono::Duration::seconds(900));
        assert_eq!(bucket.state, BucketState::Exhausted);

        // The next call is refused locally without reaching the upstream.
        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("search_twitter", json!({"query": "rust"})))
            .await;
        assert_eq!(result.error.unwrap().retry_after, Some(900));
        assert_eq!(h.upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_followers_you_know_is_derived() {
        let users: Vec<_> = (0..50)
            .map(|i| json!({"id": i.to_string(), "username": format!("user{}", i)}))
            .collect();
        let upstream = FakeUpstream::with(vec![Ok(UpstreamReply::new(json!({
            "data": users,
            "meta": {"result_count": 50}
        })))]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new(
                "get_user_followers_you_know",
                json!({"user_id": "12", "count": 50}),
            ))
            .await;

        assert!(result.success);
        assert_eq!(result.provenance, Some(Provenance::Derived));
        assert!(result.warning.is_some());
        let payload = result.payload.unwrap();
        assert!(payload["users"].as_array().unwrap().len() <= 50);
        assert_eq!(
            h.upstream.calls(),
            vec![Operation::FollowersYouKnow {
                user_id: "12".into(),
                page: xbridge_core::Page::new(50),
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let h = harness(FakeUpstream::with(Vec::new()));

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("launch_rocket", json!({})))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::UnknownTool));
        assert!(h.upstream.calls().is_empty());
        assert!(h.governor.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_name_every_field() {
        let h = harness(FakeUpstream::with(Vec::new()));

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new(
                "create_poll_tweet",
                json!({"choices": ["a"], "duration_minutes": 1}),
            ))
            .await;

        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::InvalidArguments);
        let fields: Vec<_> = error.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["text", "choices", "duration_minutes"]);
        assert!(h.upstream.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let upstream = FakeUpstream::with(vec![
            transient(),
            transient(),
            Ok(UpstreamReply::new(json!({"data": {"id": "5", "text": "hi"}}))),
        ]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_tweet_details", json!({"tweet_id": "5"})))
            .await;

        assert!(result.success);
        assert_eq!(h.upstream.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let upstream = FakeUpstream::with(vec![transient(), transient(), transient(), transient()]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_tweet_details", json!({"tweet_id": "5"})))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::TransientError));
        assert_eq!(h.upstream.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let upstream = FakeUpstream::with(vec![Err(UpstreamError::new(ToolError::NotFound(
            "tweet 5".into(),
        )))]);
        let h = harness(upstream);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_tweet_details", json!({"tweet_id": "5"})))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(h.upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_tweet_twice() {
        let upstream = FakeUpstream::with(vec![
            Ok(UpstreamReply::new(json!({"data": {"deleted": true}}))),
            Err(UpstreamError::new(ToolError::NotFound("tweet 77".into()))),
        ]);
        let h = harness(upstream);
        let call = || ToolInvocation::new("delete_tweet", json!({"tweet_id": "77"}));

        let first = h.dispatcher.invoke(call()).await;
        assert!(first.success);
        assert_eq!(first.payload.unwrap(), json!({"id": "77", "deleted": true}));

        let second = h.dispatcher.invoke(call()).await;
        assert_eq!(second.error_kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_missing_user_credentials() {
        let h = harness_with(
            FakeUpstream::with(Vec::new()),
            bearer_only(),
            DispatchConfig::default(),
        );

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("favorite_tweet", json!({"tweet_id": "1"})))
            .await;
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::AuthError);
        assert!(error.message.contains("TWITTER_ACCESS_TOKEN"));

        // Reads still work with the bearer token alone.
        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_user_by_id", json!({"user_id": "1"})))
            .await;
        assert!(result.success);
        assert_eq!(h.upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_can_require_user_context() {
        let config = DispatchConfig {
            read_requires_user_context: true,
            ..Default::default()
        };
        let h = harness_with(FakeUpstream::with(Vec::new()), bearer_only(), config);

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_user_by_id", json!({"user_id": "1"})))
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::AuthError));
        assert!(h.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vote_is_simulated() {
        let h = harness(FakeUpstream::with(Vec::new()));

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new(
                "vote_on_poll",
                json!({"tweetId": "8", "choice": "Blue"}),
            ))
            .await;

        assert!(result.success);
        assert_eq!(result.provenance, Some(Provenance::Simulated));
        assert!(result.warning.is_some());
        assert_eq!(
            result.payload.unwrap(),
            json!({"tweetId": "8", "choice": "Blue", "status": "voted"})
        );
        assert!(h.upstream.calls().is_empty());
        assert!(h.governor.snapshot(Category::TweetWrite).is_none());
    }

    #[tokio::test]
    async fn test_long_clearance_wait_fails_fast() {
        let h = harness(FakeUpstream::with(Vec::new()));
        h.governor.record_outcome(
            Category::UserRead,
            Observation::RateLimited {
                retry_after: Some(30),
                headers: RateLimitHeaders::default(),
            },
        );

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_user_profile", json!({"user_id": "3"})))
            .await;

        assert_eq!(result.error.unwrap().retry_after, Some(30));
        assert!(h.upstream.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_clearance_wait_then_proceed() {
        let h = harness(FakeUpstream::with(Vec::new()));
        h.governor.record_outcome(
            Category::UserRead,
            Observation::RateLimited {
                retry_after: Some(2),
                headers: RateLimitHeaders {
                    limit: Some(900),
                    ..Default::default()
                },
            },
        );

        let clock = h.clock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            clock.advance(chrono::Duration::seconds(3));
        });

        let result = h
            .dispatcher
            .invoke(ToolInvocation::new("get_user_profile", json!({"user_id": "3"})))
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(h.upstream.calls().len(), 1);
        assert_eq!(h.governor.snapshot(Category::UserRead).unwrap().remaining, 899);
    }

    #[tokio::test]
    async fn test_last_unit_goes_to_one_caller() {
        let config = DispatchConfig {
            max_clearance_wait: Duration::ZERO,
            ..Default::default()
        };
        let h = harness_with(FakeUpstream::with(Vec::new()), user_credentials(), config);
        h.governor.record_outcome(
            Category::TweetRead,
            Observation::Headers(RateLimitHeaders {
                limit: Some(300),
                remaining: Some(1),
                reset: Some(start().timestamp() + 600),
            }),
        );

        let call = |id: &str| {
            let dispatcher = h.dispatcher.clone();
            let invocation = ToolInvocation::new("get_tweet_details", json!({"tweet_id": id}));
            tokio::spawn(async move { dispatcher.invoke(invocation).await })
        };
        let (a, b) = tokio::join!(call("1"), call("2"));
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.success).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| r.error_kind() == Some(ErrorKind::RateLimited))
                .count(),
            1
        );
        assert_eq!(h.upstream.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_post_tweet_over_http() {
        use crate::settings::{Settings, UpstreamSettings};
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let reset = start().timestamp() + 900;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .and(body_json(json!({"text": "Hello #rust"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-rate-limit-limit", "200")
                    .insert_header("x-rate-limit-remaining", "150")
                    .insert_header("x-rate-limit-reset", reset.to_string().as_str())
                    .set_body_json(json!({"data": {"id": "1790", "text": "Hello #rust"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/2/users/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"id": "42", "username": "me"}})),
            )
            .mount(&server)
            .await;

        let settings = Settings {
            upstream: UpstreamSettings {
                api_url: server.uri(),
                ..Default::default()
            },
            ..Default::default()
        };
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = settings
            .build_dispatcher(user_credentials(), clock)
            .unwrap();

        let result = dispatcher
            .invoke(ToolInvocation::new(
                "post_tweet",
                json!({"text": "Hello", "tags": ["rust"]}),
            ))
            .await;

        assert!(result.success, "{:?}", result.error);
        let payload = result.payload.unwrap();
        assert_eq!(payload["id"], json!("1790"));
        assert_eq!(payload["text"], json!("Hello #rust"));
        assert_eq!(payload["authorId"], json!("42"));
        assert!(payload["createdAt"].is_string());

        let bucket = dispatcher.governor().snapshot(Category::TweetWrite).unwrap();
        assert_eq!(bucket.remaining, 150);
        assert_eq!(bucket.limit, Some(200));
    }
}
