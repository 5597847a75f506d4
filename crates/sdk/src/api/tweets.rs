//! Tweet lookup, creation and deletion endpoints.

use super::page_query;
use crate::client::XClient;
use crate::error::{XError, XResult};
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, CreateTweetRequest, DeleteState, Tweet, TWEET_FIELDS};
use xbridge_core::Page;

/// Tweets API.
pub struct TweetsApi<'a> {
    client: &'a XClient,
}

impl<'a> TweetsApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, tweet_id: &str) -> XResult<Reply<Tweet>> {
        let reply: Reply<ApiResponse<Tweet>> = self
            .client
            .http
            .get(
                &format!("2/tweets/{}", tweet_id),
                &[("tweet.fields", TWEET_FIELDS.to_string())],
                Auth::App,
            )
            .await?;
        reply.require("tweet")
    }

    /// Create a tweet; the response only carries `id` and `text`.
    pub async fn create(&self, request: &CreateTweetRequest) -> XResult<Reply<Tweet>> {
        let reply: Reply<ApiResponse<Tweet>> = self
            .client
            .http
            .post("2/tweets", request, Auth::User)
            .await?;
        reply.require("created tweet")
    }

    /// Delete a tweet. Deleting one that is already gone is `NotFound`.
    pub async fn delete(&self, tweet_id: &str) -> XResult<Reply<DeleteState>> {
        let reply: Reply<ApiResponse<DeleteState>> = self
            .client
            .http
            .delete(&format!("2/tweets/{}", tweet_id), Auth::User)
            .await?;
        let reply = reply.require("tweet")?;
        if !reply.data.deleted {
            return Err(XError::not_found(
                format!("tweet {} does not exist or was already deleted", tweet_id),
                reply.rate_limit,
            ));
        }
        Ok(reply)
    }

    /// Recent tweets authored by `user_id`.
    pub async fn by_user(
        &self,
        user_id: &str,
        page: &Page,
    ) -> XResult<Reply<ApiResponse<Vec<Tweet>>>> {
        let query = page_query(page, "pagination_token", ("tweet.fields", TWEET_FIELDS));
        let reply: Reply<ApiResponse<Vec<Tweet>>> = self
            .client
            .http
            .get(&format!("2/users/{}/tweets", user_id), &query, Auth::App)
            .await?;
        reply.checked("user")
    }

    /// Recent tweets mentioning `user_id`.
    pub async fn mentions(
        &self,
        user_id: &str,
        page: &Page,
    ) -> XResult<Reply<ApiResponse<Vec<Tweet>>>> {
        let query = page_query(page, "pagination_token", ("tweet.fields", TWEET_FIELDS));
        let reply: Reply<ApiResponse<Vec<Tweet>>> = self
            .client
            .http
            .get(&format!("2/users/{}/mentions", user_id), &query, Auth::App)
            .await?;
        reply.checked("user")
    }
}
