// Rate limit governor: per-category budgets, upstream figures always win

use crate::clock::{Clock, SystemClock};
use crate::types::Category;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Penalty applied when the upstream rejects a call without saying for how long.
/// Matches the platform's 15-minute write-action window.
pub const DEFAULT_PENALTY_SECS: u64 = 15 * 60;

/// Window assumed for buckets whose size was never configured.
pub const DEFAULT_WINDOW_SECS: u64 = 15 * 60;

/// Rate-limit figures reported alongside an upstream response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Unix epoch seconds at which the window resets
    pub reset: Option<i64>,
}

impl RateLimitHeaders {
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset.is_none()
    }

    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        self.reset
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Combine the figures of two responses in the same category, keeping
    /// the more restrictive budget and the later reset.
    pub fn merge(self, other: RateLimitHeaders) -> RateLimitHeaders {
        let tighter = match (self.remaining, other.remaining) {
            (Some(a), Some(b)) if b < a => other,
            (None, Some(_)) => other,
            _ => self,
        };
        RateLimitHeaders {
            limit: tighter.limit.or(self.limit).or(other.limit),
            remaining: tighter.remaining,
            reset: self.reset.max(other.reset),
        }
    }
}

/// What a finished call tells the governor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Any response that carried (possibly empty) rate-limit headers
    Headers(RateLimitHeaders),
    /// The upstream refused the call because of its rate limit
    RateLimited {
        retry_after: Option<u64>,
        headers: RateLimitHeaders,
    },
}

/// Locally configured budget for a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub category: Category,
    pub limit: u32,
    pub window_secs: u64,
}

impl Quota {
    pub fn new(category: Category, limit: u32, window_secs: u64) -> Self {
        Self {
            category,
            limit,
            window_secs,
        }
    }

    /// Budgets the platform documents for user actions.
    pub fn defaults() -> Vec<Quota> {
        vec![
            Quota::new(Category::TweetWrite, 300, 15 * 60),
            Quota::new(Category::FollowRead, 400, 24 * 60 * 60),
            Quota::new(Category::LikeWrite, 1000, 24 * 60 * 60),
        ]
    }
}

/// Answer to a clearance request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    /// Budget was available and one unit has been reserved
    Proceed,
    /// Budget is exhausted until the given instant
    WaitUntil(DateTime<Utc>),
    /// Nothing is known about this category yet
    Unknown,
}

/// Lifecycle state of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketState {
    Open,
    Exhausted,
    ResetPending,
}

#[derive(Debug, Clone)]
struct Bucket {
    remaining: u32,
    reset_at: DateTime<Utc>,
    limit: Option<u32>,
    window: Duration,
}

impl Bucket {
    fn state(&self, now: DateTime<Utc>) -> BucketState {
        if now >= self.reset_at {
            BucketState::ResetPending
        } else if self.remaining == 0 {
            BucketState::Exhausted
        } else {
            BucketState::Open
        }
    }
}

/// Point-in-time view of one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub category: Category,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub limit: Option<u32>,
    pub state: BucketState,
}

/// Synchronized table of rate-limit buckets
#[derive(Debug)]
pub struct RateLimitGovernor {
    buckets: Mutex<HashMap<Category, Bucket>>,
    quotas: HashMap<Category, Quota>,
    clock: Arc<dyn Clock>,
    penalty: Duration,
}

impl RateLimitGovernor {
    /// Create a governor with no local quotas
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            quotas: HashMap::new(),
            clock,
            penalty: secs(DEFAULT_PENALTY_SECS),
        }
    }

    /// Seed categories from local quotas on first use
    pub fn with_quotas(mut self, quotas: impl IntoIterator<Item = Quota>) -> Self {
        self.quotas = quotas.into_iter().map(|q| (q.category, q)).collect();
        self
    }

    /// Override the penalty applied to rejections without a retry hint
    pub fn with_penalty(mut self, penalty_secs: u64) -> Self {
        self.penalty = secs(penalty_secs);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Category, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn window_for(&self, category: Category) -> Duration {
        self.quotas
            .get(&category)
            .map(|q| secs(q.window_secs))
            .unwrap_or_else(|| secs(DEFAULT_WINDOW_SECS))
    }

    /// Ask whether a call in `category` may go ahead.
    ///
    /// On `Proceed` one unit of budget is reserved inside the same critical
    /// section, so concurrent callers can never both take the last unit.
    pub fn check_clearance(&self, category: Category) -> Clearance {
        let now = self.clock.now();
        let mut buckets = self.lock();

        let Some(bucket) = buckets.get_mut(&category) else {
            if let Some(quota) = self.quotas.get(&category) {
                buckets.insert(
                    category,
                    Bucket {
                        remaining: quota.limit.saturating_sub(1),
                        reset_at: now + secs(quota.window_secs),
                        limit: Some(quota.limit),
                        window: secs(quota.window_secs),
                    },
                );
            }
            return Clearance::Unknown;
        };

        if bucket.state(now) == BucketState::ResetPending {
            let limit = bucket
                .limit
                .or_else(|| self.quotas.get(&category).map(|q| q.limit));
            match limit {
                Some(limit) => {
                    bucket.remaining = limit;
                    bucket.reset_at = now + bucket.window;
                    tracing::debug!(%category, limit, "Rate limit window reopened");
                }
                None => {
                    // Never saw a full budget; start over optimistically.
                    buckets.remove(&category);
                    return Clearance::Unknown;
                }
            }
        }

        if bucket.remaining == 0 {
            return Clearance::WaitUntil(bucket.reset_at);
        }
        bucket.remaining -= 1;
        Clearance::Proceed
    }

    /// Fold the outcome of a finished call into the bucket for `category`.
    pub fn record_outcome(&self, category: Category, observation: Observation) {
        let now = self.clock.now();
        let window = self.window_for(category);
        let mut buckets = self.lock();

        match observation {
            Observation::Headers(headers) => {
                let Some(remaining) = headers.remaining else {
                    if let (Some(bucket), Some(reset_at)) =
                        (buckets.get_mut(&category), headers.reset_at())
                    {
                        bucket.reset_at = reset_at;
                    }
                    return;
                };
                let bucket = buckets.entry(category).or_insert_with(|| Bucket {
                    remaining,
                    reset_at: now + window,
                    limit: None,
                    window,
                });
                bucket.remaining = remaining;
                if let Some(reset_at) = headers.reset_at() {
                    bucket.reset_at = reset_at;
                }
                if headers.limit.is_some() {
                    bucket.limit = headers.limit;
                }
            }
            Observation::RateLimited {
                retry_after,
                headers,
            } => {
                let reset_at = match retry_after {
                    Some(after) => now + secs(after),
                    None => headers
                        .reset_at()
                        .filter(|at| *at > now)
                        .unwrap_or(now + self.penalty),
                };
                let bucket = buckets.entry(category).or_insert_with(|| Bucket {
                    remaining: 0,
                    reset_at,
                    limit: None,
                    window,
                });
                bucket.remaining = 0;
                bucket.reset_at = reset_at;
                if headers.limit.is_some() {
                    bucket.limit = headers.limit;
                }
                tracing::info!(%category, reset_at = %reset_at, "Upstream rate limit hit");
            }
        }
    }

    pub fn snapshot(&self, category: Category) -> Option<BucketSnapshot> {
        let now = self.clock.now();
        self.lock().get(&category).map(|b| BucketSnapshot {
            category,
            remaining: b.remaining,
            reset_at: b.reset_at,
            limit: b.limit,
            state: b.state(now),
        })
    }

    pub fn snapshots(&self) -> Vec<BucketSnapshot> {
        let mut all: Vec<_> = Category::ALL
            .iter()
            .filter_map(|c| self.snapshot(*c))
            .collect();
        all.sort_by_key(|s| s.category);
        all
    }
}

impl Default for RateLimitGovernor {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock)).with_quotas(Quota::defaults())
    }
}

/// Longest interval the governor will track; larger hints are clamped.
const MAX_TRACKED_SECS: u64 = 366 * 24 * 60 * 60;

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_TRACKED_SECS) as i64)
}
