//! User lookup and social graph endpoints.

use super::page_query;
use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, User, USER_FIELDS};
use xbridge_core::Page;

/// Users API for profile lookups and follower lists.
pub struct UsersApi<'a> {
    client: &'a XClient,
}

impl<'a> UsersApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    fn fields() -> [(&'static str, String); 1] {
        [("user.fields", USER_FIELDS.to_string())]
    }

    /// The account the user-context credentials belong to.
    pub async fn me(&self) -> XResult<Reply<User>> {
        let reply: Reply<ApiResponse<User>> = self
            .client
            .http
            .get("2/users/me", &Self::fields(), Auth::User)
            .await?;
        reply.require("authenticated user")
    }

    pub async fn get(&self, user_id: &str) -> XResult<Reply<User>> {
        let reply: Reply<ApiResponse<User>> = self
            .client
            .http
            .get(&format!("2/users/{}", user_id), &Self::fields(), Auth::App)
            .await?;
        reply.require("user")
    }

    pub async fn by_username(&self, username: &str) -> XResult<Reply<User>> {
        let reply: Reply<ApiResponse<User>> = self
            .client
            .http
            .get(
                &format!("2/users/by/username/{}", username),
                &Self::fields(),
                Auth::App,
            )
            .await?;
        reply.require("user")
    }

    /// One page of accounts following `user_id`.
    pub async fn followers(
        &self,
        user_id: &str,
        page: &Page,
    ) -> XResult<Reply<ApiResponse<Vec<User>>>> {
        let query = page_query(page, "pagination_token", ("user.fields", USER_FIELDS));
        let reply: Reply<ApiResponse<Vec<User>>> = self
            .client
            .http
            .get(&format!("2/users/{}/followers", user_id), &query, Auth::App)
            .await?;
        reply.checked("user")
    }

    /// One page of accounts `user_id` follows.
    pub async fn following(
        &self,
        user_id: &str,
        page: &Page,
    ) -> XResult<Reply<ApiResponse<Vec<User>>>> {
        let query = page_query(page, "pagination_token", ("user.fields", USER_FIELDS));
        let reply: Reply<ApiResponse<Vec<User>>> = self
            .client
            .http
            .get(&format!("2/users/{}/following", user_id), &query, Auth::App)
            .await?;
        reply.checked("user")
    }
}
