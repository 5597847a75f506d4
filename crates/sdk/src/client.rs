//! Main client for the X API.

use crate::api::*;
use crate::config::{with_trailing_slash, ClientConfig, DEFAULT_API_URL, DEFAULT_UPLOAD_URL};
use crate::error::{XError, XResult};
use crate::transport::{HttpTransport, Reply};
use crate::types::{
    ApiResponse, CreateTweetRequest, MediaAttachment, PollRequest, ReplySettings, ResponseMeta,
    User,
};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use url::Url;
use xbridge_core::{
    Clock, CredentialBundle, NewTweet, Operation, Page, RateLimitHeaders, SystemClock, Upstream,
    UpstreamError, UpstreamReply,
};

/// Largest page the follow graph endpoints return.
const MAX_GRAPH_PAGE: u32 = 1000;
const BOOKMARK_PAGE: u32 = 100;
/// The platform caps bookmarks at 800, so ten pages always suffice.
const MAX_BOOKMARK_PAGES: usize = 10;

/// Client for the X REST API.
#[derive(Clone)]
pub struct XClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
    me: Arc<OnceCell<String>>,
}

impl XClient {
    /// Create a new client builder.
    pub fn builder() -> XClientBuilder {
        XClientBuilder::new()
    }

    fn from_config(config: ClientConfig, credentials: CredentialBundle) -> XResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone(), Arc::new(credentials))?;

        Ok(Self {
            config,
            http,
            me: Arc::new(OnceCell::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(self)
    }

    pub fn tweets(&self) -> TweetsApi<'_> {
        TweetsApi::new(self)
    }

    pub fn likes(&self) -> LikesApi<'_> {
        LikesApi::new(self)
    }

    pub fn bookmarks(&self) -> BookmarksApi<'_> {
        BookmarksApi::new(self)
    }

    pub fn timelines(&self) -> TimelinesApi<'_> {
        TimelinesApi::new(self)
    }

    pub fn search(&self) -> SearchApi<'_> {
        SearchApi::new(self)
    }

    pub fn trends(&self) -> TrendsApi<'_> {
        TrendsApi::new(self)
    }

    pub fn media(&self) -> MediaApi<'_> {
        MediaApi::new(self)
    }

    /// Id of the authenticated account, looked up once and then cached.
    pub async fn me_id(&self) -> XResult<String> {
        self.me
            .get_or_try_init(|| async {
                let reply = self.users().me().await?;
                info!(user_id = %reply.data.id, "Resolved authenticated user");
                Ok::<_, XError>(reply.data.id)
            })
            .await
            .cloned()
    }

    /// Run one operation, returning the raw response envelope.
    #[instrument(skip_all, fields(operation = operation.name()))]
    pub async fn perform(&self, operation: &Operation) -> XResult<UpstreamReply> {
        match operation {
            Operation::GetUser { user_id } => {
                envelope(self.users().get(user_id).await?.map(ApiResponse::new))
            }
            Operation::GetUserByUsername { username } => {
                envelope(self.users().by_username(username).await?.map(ApiResponse::new))
            }
            Operation::GetFollowers { user_id, page } => {
                envelope(self.users().followers(user_id, page).await?)
            }
            Operation::GetFollowing { user_id, page }
            | Operation::Subscriptions { user_id, page } => {
                envelope(self.users().following(user_id, page).await?)
            }
            Operation::FollowersYouKnow { user_id, page } => {
                self.followers_you_know(user_id, page).await
            }
            Operation::PostTweet(tweet) => self.post_tweet(tweet).await,
            Operation::DeleteTweet { tweet_id } => {
                envelope(self.tweets().delete(tweet_id).await?.map(ApiResponse::new))
            }
            Operation::GetTweet { tweet_id } => {
                envelope(self.tweets().get(tweet_id).await?.map(ApiResponse::new))
            }
            Operation::VoteOnPoll { .. } => Ok(UpstreamReply::new(
                operation.simulated_payload().unwrap_or_default(),
            )),
            Operation::LikeTweet { tweet_id } => {
                let me = self.me_id().await?;
                envelope(self.likes().like(&me, tweet_id).await?.map(ApiResponse::new))
            }
            Operation::UnlikeTweet { tweet_id } => {
                let me = self.me_id().await?;
                envelope(self.likes().unlike(&me, tweet_id).await?.map(ApiResponse::new))
            }
            Operation::BookmarkTweet { tweet_id, .. } => {
                let me = self.me_id().await?;
                envelope(self.bookmarks().add(&me, tweet_id).await?.map(ApiResponse::new))
            }
            Operation::RemoveBookmark { tweet_id } => {
                let me = self.me_id().await?;
                envelope(self.bookmarks().remove(&me, tweet_id).await?.map(ApiResponse::new))
            }
            Operation::DeleteAllBookmarks => self.delete_all_bookmarks().await,
            Operation::HomeTimeline {
                page,
                exclude_replies_and_retweets,
            } => {
                let me = self.me_id().await?;
                envelope(
                    self.timelines()
                        .home(&me, page, *exclude_replies_and_retweets)
                        .await?,
                )
            }
            Operation::SearchRecent {
                query,
                sort_order,
                page,
            } => envelope(self.search().recent(query, *sort_order, page).await?),
            Operation::Trends {
                woeid,
                category,
                count,
            } => {
                let reply = self.trends().place(*woeid).await?;
                envelope(reply.map(|trends| {
                    let selected: Vec<_> = trends
                        .into_iter()
                        .filter(|t| match category {
                            Some(wanted) => t
                                .category
                                .as_deref()
                                .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
                            None => true,
                        })
                        .take(*count as usize)
                        .collect();
                    ApiResponse::new(selected)
                }))
            }
            Operation::Highlights { user_id, page } => {
                envelope(self.tweets().by_user(user_id, page).await?)
            }
            Operation::UserMentions { user_id, page } => {
                envelope(self.tweets().mentions(user_id, page).await?)
            }
        }
    }

    /// Followers of `user_id` whom the authenticated account also follows.
    async fn followers_you_know(&self, user_id: &str, page: &Page) -> XResult<UpstreamReply> {
        let me = self.me_id().await?;
        let followers = self.users().followers(user_id, page).await?;
        let following = self
            .users()
            .following(&me, &Page::new(MAX_GRAPH_PAGE))
            .await?;

        let known: HashSet<&str> = following
            .data
            .data
            .iter()
            .flatten()
            .map(|u| u.id.as_str())
            .collect();
        // Both endpoints draw on the follow-read budget.
        let rate_limit = followers.rate_limit.merge(following.rate_limit);
        let next_token = followers.data.next_token().map(str::to_string);
        let mut mutual: Vec<User> = followers
            .data
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|u| known.contains(u.id.as_str()))
            .collect();
        mutual.truncate(page.max_results as usize);

        let meta = ResponseMeta {
            result_count: Some(mutual.len() as u32),
            next_token,
        };
        envelope(Reply {
            data: ApiResponse {
                data: Some(mutual),
                meta: Some(meta),
                errors: Vec::new(),
            },
            rate_limit,
        })
    }

    async fn post_tweet(&self, tweet: &NewTweet) -> XResult<UpstreamReply> {
        let mut media_ids = Vec::with_capacity(tweet.media_paths.len());
        for path in &tweet.media_paths {
            media_ids.push(self.media().upload(path).await?.data.media_id_string);
        }

        let request = CreateTweetRequest {
            text: tweet.text.clone(),
            reply: tweet.reply_to.clone().map(|id| ReplySettings {
                in_reply_to_tweet_id: id,
            }),
            media: (!media_ids.is_empty()).then_some(MediaAttachment { media_ids }),
            poll: tweet.poll.as_ref().map(|p| PollRequest {
                options: p.options.clone(),
                duration_minutes: p.duration_minutes,
            }),
        };
        let created = self.tweets().create(&request).await?;

        // The tweet exists now; a failed author lookup must not fail the call.
        let author_id = match self.me_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Could not resolve author of new tweet");
                None
            }
        };
        let created_at = self
            .config
            .clock
            .now()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        info!(tweet_id = %created.data.id, "Tweet created");
        envelope(created.map(|mut t| {
            t.author_id = t.author_id.or(author_id);
            t.created_at = t.created_at.or(Some(created_at));
            ApiResponse::new(t)
        }))
    }

    async fn delete_all_bookmarks(&self) -> XResult<UpstreamReply> {
        let me = self.me_id().await?;
        let mut rate_limit = RateLimitHeaders::default();
        let mut ids = Vec::new();
        let mut page = Page::new(BOOKMARK_PAGE);

        for _ in 0..MAX_BOOKMARK_PAGES {
            let reply = self.bookmarks().list(&me, &page).await?;
            rate_limit = rate_limit.merge(reply.rate_limit);
            ids.extend(reply.data.data.iter().flatten().map(|t| t.id.clone()));
            match reply.data.next_token() {
                Some(next) => {
                    page = Page::new(BOOKMARK_PAGE).with_cursor(Some(next.to_string()))
                }
                None => break,
            }
        }

        let total = ids.len();
        let mut deleted = 0u32;
        for id in &ids {
            match self.bookmarks().remove(&me, id).await {
                Ok(reply) => {
                    rate_limit = rate_limit.merge(reply.rate_limit);
                    if !reply.data.bookmarked {
                        deleted += 1;
                    }
                }
                // Nothing has changed yet, so the whole call can be repeated.
                Err(e) if deleted == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, deleted, total, "Stopped removing bookmarks");
                    let mut stopped = e.rate_limit();
                    if let XError::RateLimited { retry_after, .. } = &e {
                        let now = self.config.clock.now().timestamp();
                        stopped.remaining = Some(0);
                        stopped.reset = stopped.reset.or(Some(now + *retry_after as i64));
                    }
                    let reply = cleared(deleted, total, false);
                    return Ok(reply.with_rate_limit(rate_limit.merge(stopped)));
                }
            }
        }

        info!(deleted, "Removed all bookmarks");
        Ok(cleared(deleted, total, true).with_rate_limit(rate_limit))
    }
}

fn cleared(deleted: u32, total: usize, complete: bool) -> UpstreamReply {
    UpstreamReply::new(json!({
        "data": { "deleted": deleted, "total": total, "complete": complete }
    }))
}

fn envelope<T: Serialize>(reply: Reply<T>) -> XResult<UpstreamReply> {
    Ok(UpstreamReply::new(serde_json::to_value(&reply.data)?).with_rate_limit(reply.rate_limit))
}

#[async_trait]
impl Upstream for XClient {
    async fn execute(&self, operation: &Operation) -> Result<UpstreamReply, UpstreamError> {
        self.perform(operation).await.map_err(XError::into_upstream)
    }
}

/// Builder for creating an XClient.
pub struct XClientBuilder {
    api_url: String,
    upload_url: Option<String>,
    timeout: Duration,
    credentials: CredentialBundle,
    clock: Arc<dyn Clock>,
}

impl XClientBuilder {
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            upload_url: None,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            credentials: CredentialBundle::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the REST API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the media upload base URL.
    ///
    /// Defaults to the public upload host when the API URL is the default,
    /// otherwise to the API URL itself.
    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credentials(mut self, credentials: CredentialBundle) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the client.
    pub fn build(self) -> XResult<XClient> {
        let api_url = with_trailing_slash(Url::parse(&self.api_url)?);
        let upload_url = match self.upload_url {
            Some(url) => with_trailing_slash(Url::parse(&url)?),
            None if self.api_url == DEFAULT_API_URL => Url::parse(DEFAULT_UPLOAD_URL)?,
            None => api_url.clone(),
        };
        if self.timeout.is_zero() {
            return Err(XError::Config("timeout must be greater than zero".to_string()));
        }

        let config = ClientConfig::new(api_url)
            .with_upload_url(upload_url)
            .with_timeout(self.timeout)
            .with_clock(self.clock);
        XClient::from_config(config, self.credentials)
    }
}

impl Default for XClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
