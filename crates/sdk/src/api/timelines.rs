//! Home timeline endpoint.

use super::page_query;
use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, Tweet, TWEET_FIELDS};
use xbridge_core::Page;

pub struct TimelinesApi<'a> {
    client: &'a XClient,
}

impl<'a> TimelinesApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    /// Reverse-chronological home timeline of the authenticated user.
    pub async fn home(
        &self,
        me: &str,
        page: &Page,
        exclude_replies_and_retweets: bool,
    ) -> XResult<Reply<ApiResponse<Vec<Tweet>>>> {
        let mut query = page_query(page, "pagination_token", ("tweet.fields", TWEET_FIELDS));
        if exclude_replies_and_retweets {
            query.push(("exclude", "replies,retweets".to_string()));
        }
        let reply: Reply<ApiResponse<Vec<Tweet>>> = self
            .client
            .http
            .get(
                &format!("2/users/{}/timelines/reverse_chronological", me),
                &query,
                Auth::User,
            )
            .await?;
        reply.checked("timeline")
    }
}
