//! Recent search endpoint.

use super::page_query;
use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{ApiResponse, Tweet, TWEET_FIELDS};
use xbridge_core::{Page, SortOrder};

pub struct SearchApi<'a> {
    client: &'a XClient,
}

impl<'a> SearchApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    /// Search tweets from the last seven days.
    pub async fn recent(
        &self,
        query: &str,
        sort_order: SortOrder,
        page: &Page,
    ) -> XResult<Reply<ApiResponse<Vec<Tweet>>>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("sort_order", sort_order.as_str().to_string()),
        ];
        params.extend(page_query(page, "next_token", ("tweet.fields", TWEET_FIELDS)));

        self.client
            .http
            .get("2/tweets/search/recent", &params, Auth::App)
            .await
    }
}
