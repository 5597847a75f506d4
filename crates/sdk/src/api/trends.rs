//! Trending topics (v1.1).

use crate::client::XClient;
use crate::error::XResult;
use crate::transport::{Auth, Reply};
use crate::types::{Trend, TrendLocation};

pub struct TrendsApi<'a> {
    client: &'a XClient,
}

impl<'a> TrendsApi<'a> {
    pub(crate) fn new(client: &'a XClient) -> Self {
        Self { client }
    }

    /// Trends for a location, flattened across the returned locations.
    pub async fn place(&self, woeid: u32) -> XResult<Reply<Vec<Trend>>> {
        let reply: Reply<Vec<TrendLocation>> = self
            .client
            .http
            .get("1.1/trends/place.json", &[("id", woeid.to_string())], Auth::App)
            .await?;
        Ok(reply.map(|locations| locations.into_iter().flat_map(|l| l.trends).collect()))
    }
}
