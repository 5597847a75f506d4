//! API endpoint modules for the X client.

mod bookmarks;
mod likes;
mod media;
mod search;
mod timelines;
mod trends;
mod tweets;
mod users;

pub use bookmarks::BookmarksApi;
pub use likes::LikesApi;
pub use media::MediaApi;
pub use search::SearchApi;
pub use timelines::TimelinesApi;
pub use trends::TrendsApi;
pub use tweets::TweetsApi;
pub use users::UsersApi;

use crate::error::{XError, XResult};
use crate::transport::Reply;
use crate::types::ApiResponse;
use xbridge_core::Page;

/// Query parameters for a paged list request.
///
/// Search pages with `next_token`, every other list endpoint with
/// `pagination_token`.
pub(crate) fn page_query(
    page: &Page,
    token_param: &'static str,
    fields: (&'static str, &'static str),
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("max_results", page.max_results.to_string()),
        (fields.0, fields.1.to_string()),
    ];
    if let Some(cursor) = &page.cursor {
        query.push((token_param, cursor.clone()));
    }
    query
}

impl<T> Reply<ApiResponse<T>> {
    /// Take `data` out of the envelope; a data-less response is `NotFound`
    /// when the API says so and an API error otherwise.
    pub fn require(self, what: &str) -> XResult<Reply<T>> {
        let Reply { data, rate_limit } = self;
        if data.is_not_found() {
            let message = data.problem().unwrap_or_else(|| format!("{} not found", what));
            return Err(XError::not_found(message, rate_limit));
        }
        let problem = data.problem();
        match data.data {
            Some(inner) => Ok(Reply {
                data: inner,
                rate_limit,
            }),
            None => Err(XError::Api {
                status: 200,
                message: problem.unwrap_or_else(|| format!("response carried no {}", what)),
                rate_limit,
            }),
        }
    }

    /// Keep the envelope, failing only if it reports a missing resource.
    pub fn checked(self, what: &str) -> XResult<Self> {
        if self.data.is_not_found() {
            let message = self
                .data
                .problem()
                .unwrap_or_else(|| format!("{} not found", what));
            return Err(XError::not_found(message, self.rate_limit));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApiProblem, Tweet};
    use xbridge_core::RateLimitHeaders;

    fn reply<T>(data: ApiResponse<T>) -> Reply<ApiResponse<T>> {
        Reply {
            data,
            rate_limit: RateLimitHeaders {
                remaining: Some(5),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_page_query() {
        let page = Page::new(50).with_cursor(Some("abc".into()));
        let query = page_query(&page, "pagination_token", ("user.fields", "id"));
        assert_eq!(
            query,
            vec![
                ("max_results", "50".to_string()),
                ("user.fields", "id".to_string()),
                ("pagination_token", "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_require_maps_not_found() {
        let missing: ApiResponse<Tweet> = ApiResponse {
            data: None,
            meta: None,
            errors: vec![ApiProblem {
                title: Some("Not Found Error".into()),
                detail: Some("Could not find tweet with id: [7].".into()),
                ..Default::default()
            }],
        };

        match reply(missing).require("tweet") {
            Err(XError::NotFound {
                message,
                rate_limit,
            }) => {
                assert!(message.contains("[7]"));
                assert_eq!(rate_limit.remaining, Some(5));
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_checked_allows_empty_lists() {
        let empty: ApiResponse<Vec<Tweet>> = ApiResponse {
            data: None,
            meta: None,
            errors: Vec::new(),
        };
        assert!(reply(empty).checked("timeline").is_ok());
    }
}
