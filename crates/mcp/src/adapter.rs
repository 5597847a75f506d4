// Runs one upstream attempt and reports its outcome to the governor

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use xbridge_core::{
    Category, Observation, Operation, RateLimitGovernor, ToolError, Upstream, UpstreamReply,
};

#[derive(Clone)]
pub struct UpstreamAdapter {
    upstream: Arc<dyn Upstream>,
    governor: Arc<RateLimitGovernor>,
    call_timeout: Duration,
}

impl UpstreamAdapter {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        governor: Arc<RateLimitGovernor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            governor,
            call_timeout,
        }
    }

    /// Perform a single attempt of `operation`.
    ///
    /// The call runs on its own task, so neither a timeout nor dropping the
    /// returned future aborts it, and its rate-limit figures are always
    /// recorded. Bulk operations are waited for without the call timeout.
    pub async fn call(
        &self,
        category: Category,
        operation: Operation,
    ) -> Result<UpstreamReply, ToolError> {
        if let Some(payload) = operation.simulated_payload() {
            debug!(operation = operation.name(), "Answering locally");
            return Ok(UpstreamReply::new(payload));
        }

        let upstream = Arc::clone(&self.upstream);
        let governor = Arc::clone(&self.governor);
        let name = operation.name();
        let bulk = operation.is_bulk();

        // The task owns the request and its bookkeeping; giving up on the
        // wait below never drops an in-flight call or its headers.
        let mut task = tokio::spawn(async move {
            let outcome = upstream.execute(&operation).await;
            let observation = match &outcome {
                Ok(reply) => Observation::Headers(reply.rate_limit),
                Err(err) => err.observation(),
            };
            governor.record_outcome(category, observation);
            outcome
        });

        let joined = if bulk {
            task.await
        } else {
            match tokio::time::timeout(self.call_timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(operation = name, timeout = ?self.call_timeout, "Stopped waiting for upstream");
                    return Err(ToolError::Transient(format!(
                        "{} timed out after {:?}",
                        name, self.call_timeout
                    )));
                }
            }
        };

        match joined {
            Ok(outcome) => outcome.map_err(|e| e.error),
            Err(e) => {
                warn!(error = %e, "Upstream task did not complete");
                Err(ToolError::Transient(format!("upstream task failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xbridge_core::{BucketState, ManualClock, RateLimitHeaders, UpstreamError};

    struct Slow {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Upstream for Slow {
        async fn execute(&self, _operation: &Operation) -> Result<UpstreamReply, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(UpstreamReply::new(json!({"data": {"id": "1"}})).with_rate_limit(
                RateLimitHeaders {
                    limit: Some(900),
                    remaining: Some(899),
                    reset: Some(Utc::now().timestamp() + 600),
                },
            ))
        }
    }

    fn governor() -> Arc<RateLimitGovernor> {
        let clock = ManualClock::new(Utc::now());
        Arc::new(RateLimitGovernor::new(Arc::new(clock)).with_quotas(Vec::new()))
    }

    fn get_user() -> Operation {
        Operation::GetUser {
            user_id: "1".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let upstream = Arc::new(Slow {
            delay: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
        });
        let adapter = UpstreamAdapter::new(upstream, governor(), Duration::from_secs(5));

        let err = adapter
            .call(Category::UserRead, get_user())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Transient(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_still_records() {
        let governor = governor();
        let upstream = Arc::new(Slow {
            delay: Duration::from_secs(2),
            calls: AtomicUsize::new(0),
        });
        let adapter = UpstreamAdapter::new(upstream.clone(), governor.clone(), Duration::from_secs(30));

        let call = adapter.call(Category::UserRead, get_user());
        assert!(tokio::time::timeout(Duration::from_millis(100), call)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
        let snapshot = governor.snapshot(Category::UserRead).unwrap();
        assert_eq!(snapshot.remaining, 899);
        assert_eq!(snapshot.state, BucketState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_call_still_records() {
        let governor = governor();
        let upstream = Arc::new(Slow {
            delay: Duration::from_secs(60),
            calls: AtomicUsize::new(0),
        });
        let adapter = UpstreamAdapter::new(upstream, governor.clone(), Duration::from_secs(5));

        let err = adapter
            .call(Category::UserRead, get_user())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Transient(_)));
        assert!(governor.snapshot(Category::UserRead).is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        let snapshot = governor.snapshot(Category::UserRead).unwrap();
        assert_eq!(snapshot.remaining, 899);
        assert_eq!(snapshot.limit, Some(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_deletion_outlives_call_timeout() {
        struct SlowBulk;

        #[async_trait]
        impl Upstream for SlowBulk {
            async fn execute(&self, _: &Operation) -> Result<UpstreamReply, UpstreamError> {
                // Slower than the call timeout.
                for _ in 0..10 {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Ok(
                    UpstreamReply::new(json!({"data": {"deleted": 1000, "complete": true}}))
                        .with_rate_limit(RateLimitHeaders {
                            limit: Some(50),
                            remaining: Some(7),
                            reset: Some(Utc::now().timestamp() + 600),
                        }),
                )
            }
        }

        let governor = governor();
        let adapter = UpstreamAdapter::new(Arc::new(SlowBulk), governor.clone(), Duration::from_secs(2));

        let reply = adapter
            .call(Category::Bookmark, Operation::DeleteAllBookmarks)
            .await
            .unwrap();

        assert_eq!(reply.payload["data"]["deleted"], json!(1000));
        assert_eq!(governor.snapshot(Category::Bookmark).unwrap().remaining, 7);
    }

    #[tokio::test]
    async fn test_simulated_operation_skips_upstream() {
        let upstream = Arc::new(Slow {
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        });
        let adapter = UpstreamAdapter::new(upstream.clone(), governor(), Duration::from_secs(5));

        let reply = adapter
            .call(
                Category::TweetWrite,
                Operation::VoteOnPoll {
                    tweet_id: "5".into(),
                    choice: "Yes".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.payload["status"], json!("voted"));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_error_exhausts_bucket() {
        struct Limited;

        #[async_trait]
        impl Upstream for Limited {
            async fn execute(&self, _: &Operation) -> Result<UpstreamReply, UpstreamError> {
                Err(UpstreamError::new(ToolError::RateLimited { retry_after: 900 }))
            }
        }

        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let governor = Arc::new(RateLimitGovernor::new(Arc::new(ManualClock::new(start))));
        let adapter = UpstreamAdapter::new(Arc::new(Limited), governor.clone(), Duration::from_secs(5));

        let err = adapter
            .call(
                Category::Search,
                Operation::SearchRecent {
                    query: "rust".into(),
                    sort_order: xbridge_core::SortOrder::Relevancy,
                    page: xbridge_core::Page::new(10),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, ToolError::RateLimited { retry_after: 900 });
        let snapshot = governor.snapshot(Category::Search).unwrap();
        assert_eq!(snapshot.remaining, 0);
        assert_eq!(snapshot.reset_at, start + chrono::Duration::seconds(900));
    }
}
