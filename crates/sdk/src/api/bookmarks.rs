//! Bookmark endpoints.

use super::page_query;
use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, BookmarkState, Tweet, TweetIdBody, TWEET_FIELDS};
use xbridge_core::Page;

pub struct BookmarksApi<'a> {
    client: &'a XClient,
}

impl<'a> BookmarksApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, me: &str, page: &Page) -> XResult<Reply<ApiResponse<Vec<Tweet>>>> {
        let query = page_query(page, "pagination_token", ("tweet.fields", TWEET_FIELDS));
        let reply: Reply<ApiResponse<Vec<Tweet>>> = self
            .client
            .http
            .get(&format!("2/users/{}/bookmarks", me), &query, Auth::User)
            .await?;
        reply.checked("bookmarks")
    }

    pub async fn add(&self, me: &str, tweet_id: &str) -> XResult<Reply<BookmarkState>> {
        let reply: Reply<ApiResponse<BookmarkState>> = self
            .client
            .http
            .post(
                &format!("2/users/{}/bookmarks", me),
                &TweetIdBody { tweet_id },
                Auth::User,
            )
            .await?;
        reply.require("tweet")
    }

    pub async fn remove(&self, me: &str, tweet_id: &str) -> XResult<Reply<BookmarkState>> {
        let reply: Reply<ApiResponse<BookmarkState>> = self
            .client
            .http
            .delete(&format!("2/users/{}/bookmarks/{}", me, tweet_id), Auth::User)
            .await?;
        reply.require("tweet")
    }
}
