//! Wire types for the X API.

use serde::{Deserialize, Serialize};

/// Comma-separated field lists requested on every lookup.
pub const USER_FIELDS: &str = "id,name,username,profile_image_url,description";
pub const TWEET_FIELDS: &str = "id,text,created_at,author_id";

/// Standard v2 response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,

    /// Partial failures reported alongside (or instead of) data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiProblem>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            errors: Vec::new(),
        }
    }

    /// The response describes a missing resource rather than returning it.
    pub fn is_not_found(&self) -> bool {
        self.data.is_none() && self.errors.iter().any(ApiProblem::is_not_found)
    }

    pub fn next_token(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.next_token.as_deref())
    }

    /// First problem description, for error messages.
    pub fn problem(&self) -> Option<String> {
        self.errors.first().map(ApiProblem::describe)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// v2 problem object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default, rename = "type")]
    pub problem_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
}

impl ApiProblem {
    pub fn is_not_found(&self) -> bool {
        self.problem_type
            .as_deref()
            .is_some_and(|t| t.ends_with("resource-not-found"))
            || self.title.as_deref() == Some("Not Found Error")
    }

    pub fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

/// Body of `POST /2/tweets`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTweetRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplySettings {
    pub in_reply_to_tweet_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub media_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRequest {
    pub options: Vec<String>,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeleteState {
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookmarkState {
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TweetIdBody<'a> {
    pub tweet_id: &'a str,
}

/// One entry of `GET /1.1/trends/place.json`
#[derive(Debug, Clone, Deserialize)]
pub struct TrendLocation {
    #[serde(default)]
    pub trends: Vec<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_volume: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Response of the v1.1 media upload endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUpload {
    pub media_id_string: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_envelope() {
        let body = json!({
            "errors": [{
                "value": "1",
                "detail": "Could not find tweet with id: [1].",
                "title": "Not Found Error",
                "resource_type": "tweet",
                "type": "https://api.twitter.com/2/problems/resource-not-found"
            }]
        });
        let response: ApiResponse<Tweet> = serde_json::from_value(body).unwrap();

        assert!(response.is_not_found());
        assert_eq!(
            response.problem().as_deref(),
            Some("Could not find tweet with id: [1].")
        );
    }

    #[test]
    fn test_empty_list_has_no_data() {
        let response: ApiResponse<Vec<User>> =
            serde_json::from_value(json!({"meta": {"result_count": 0}})).unwrap();
        assert!(response.data.is_none());
        assert!(!response.is_not_found());
        assert!(response.next_token().is_none());
    }

    #[test]
    fn test_create_request_omits_unset_parts() {
        let request = CreateTweetRequest {
            text: "Hello".into(),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"text": "Hello"}));

        let request = CreateTweetRequest {
            text: "Pick one".into(),
            reply: Some(ReplySettings {
                in_reply_to_tweet_id: "9".into(),
            }),
            poll: Some(PollRequest {
                options: vec!["a".into(), "b".into()],
                duration_minutes: 60,
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "text": "Pick one",
                "reply": {"in_reply_to_tweet_id": "9"},
                "poll": {"options": ["a", "b"], "duration_minutes": 60}
            })
        );
    }
}
