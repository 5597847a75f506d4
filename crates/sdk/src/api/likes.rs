//! Like (favorite) endpoints.

use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, LikeState, TweetIdBody};

pub struct LikesApi<'a> {
    client: &'a XClient,
}

impl<'a> LikesApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    pub async fn like(&self, me: &str, tweet_id: &str) -> XResult<Reply<LikeState>> {
        let reply: Reply<ApiResponse<LikeState>> = self
            .client
            .http
            .post(
                &format!("2/users/{}/likes", me),
                &TweetIdBody { tweet_id },
                Auth::User,
            )
            .await?;
        reply.require("tweet")
    }

    pub async fn unlike(&self, me: &str, tweet_id: &str) -> XResult<Reply<LikeState>> {
        let reply: Reply<ApiResponse<LikeState>> = self
            .client
            .http
            .delete(&format!("2/users/{}/likes/{}", me, tweet_id), Auth::User)
            .await?;
        reply.require("tweet")
    }
}
